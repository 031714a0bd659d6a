use crate::Commands;

mod imagefilter;
mod meta;
mod pickerwheel;
mod radio;

pub struct Cog {
    pub commands: Commands,
    pub category: String,
}

impl Cog {
    pub fn new(commands: Commands, category: String) -> Self {
        Self { commands, category }
    }
}

// A thin cog layer over poise: every command (and subcommand) of a cog is filed
// under the cog's help category.
pub fn commands() -> Commands {
    let cogs = [
        meta::cog(),
        pickerwheel::cog(),
        imagefilter::cog(),
        radio::cog(),
    ];

    let mut result = vec![];
    for cog in cogs {
        for command in cog.commands {
            result.push(categorize(command, &cog.category));
        }
    }
    result
}

fn categorize(
    command: poise::Command<crate::state::Data, crate::Error>,
    category: &str,
) -> poise::Command<crate::state::Data, crate::Error> {
    poise::Command {
        category: Some(category.to_string()),
        subcommands: command
            .subcommands
            .into_iter()
            .map(|sub| categorize(sub, category))
            .collect(),
        ..command
    }
}
