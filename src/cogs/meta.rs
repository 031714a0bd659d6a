use poise::{builtins::autocomplete_command, samples::HelpConfiguration};
use span_derive::inject_span;

use crate::{util::Spanned, Context};

use super::Cog;

pub fn cog() -> Cog {
    Cog::new(vec![help(), source()], "Meta".to_string())
}

/// Get help on the bot or a command
#[inject_span]
#[poise::command(prefix_command, slash_command)]
async fn help(
    ctx: Context<'_>,
    #[description = "Command to show help about"]
    #[autocomplete = "autocomplete_command"]
    #[rest]
    command: Option<String>,
) -> anyhow::Result<()> {
    let config = HelpConfiguration {
        extra_text_at_bottom: "Use `help <command>` for details, e.g. `help pickerwheel spin`.",
        ..Default::default()
    };
    poise::builtins::help(ctx, command.as_deref(), config).await?;
    Ok(())
}

fn source_link(repository: &str, span: &Spanned) -> String {
    format!(
        "Command `{}` is defined in [`{}`, line {}](<{}/blob/main/{}#L{}>)",
        span.name,
        span.file,
        span.line,
        repository.trim_end_matches('/'),
        span.file,
        span.line
    )
}

/// Link to the source code of a command
#[inject_span]
#[poise::command(prefix_command, slash_command)]
async fn source(
    ctx: Context<'_>,
    #[description = "Command to show the source of"]
    #[autocomplete = "autocomplete_command"]
    command: String,
) -> anyhow::Result<()> {
    let Some(repository) = &ctx.data().config.repository_url else {
        ctx.say("No source repository is configured for this bot.")
            .await?;
        return Ok(());
    };

    let span = ctx
        .framework()
        .options()
        .commands
        .iter()
        .find(|cmd| cmd.name == command || cmd.aliases.contains(&command))
        .and_then(|resolved| resolved.custom_data.downcast_ref::<Spanned>());

    match span {
        Some(span) => ctx.say(source_link(repository, span)).await?,
        None => ctx.say(format!("Command `{command}` not found")).await?,
    };
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn links_point_at_the_definition() {
        let span = Spanned {
            name: "spin",
            file: "src/cogs/pickerwheel.rs",
            line: 42,
            inner: Box::new(()),
        };
        assert_eq!(
            source_link("https://github.com/someone/pickerbot/", &span),
            "Command `spin` is defined in [`src/cogs/pickerwheel.rs`, line 42](<https://github.com/someone/pickerbot/blob/main/src/cogs/pickerwheel.rs#L42>)"
        );
    }
}
