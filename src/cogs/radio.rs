use poise::{serenity_prelude as serenity, CreateReply};
use span_derive::inject_span;

use crate::{
    apis::radio_browser::{SearchQuery, Station},
    Context,
};

use super::Cog;

pub fn cog() -> Cog {
    Cog::new(vec![radio()], "Radio".to_string())
}

fn results_embed(query: &SearchQuery, stations: &[Station], prefix: &str) -> serenity::CreateEmbed {
    let fields = stations.iter().enumerate().map(|(i, station)| {
        (
            format!("{}. {}", i + 1, station.display_name()),
            format!(
                "Country: {} | Language: {}",
                station.display_country(),
                station.display_language()
            ),
            false,
        )
    });
    serenity::CreateEmbed::new()
        .title(format!("Results — {}: {}", query.field, query.text))
        .colour(serenity::Colour::DARK_GREEN)
        .fields(fields)
        .footer(serenity::CreateEmbedFooter::new(format!(
            "Type {prefix}radio pick <number> to get the stream URL"
        )))
}

fn station_embed(station: &Station) -> serenity::CreateEmbed {
    serenity::CreateEmbed::new()
        .title(station.display_name())
        .colour(serenity::Colour::BLUE)
        .field("🔗 Stream URL", station.stream_url(), false)
        .field("🌍 Country", station.display_country(), true)
        .field("🗣️ Language", station.display_language(), true)
}

fn random_embed(station: &Station) -> serenity::CreateEmbed {
    serenity::CreateEmbed::new()
        .title("🎲 Random Radio Station")
        .colour(serenity::Colour::PURPLE)
        .field(
            station.display_name(),
            format!("[Listen here]({})", station.stream_url()),
            false,
        )
        .field("🌍 Country", station.display_country(), true)
        .field("🗣️ Language", station.display_language(), true)
}

/// Search and fetch radio stations from Radio Browser.
#[inject_span]
#[poise::command(
    prefix_command,
    slash_command,
    subcommands("search", "pick", "random"),
    subcommand_required
)]
async fn radio(_ctx: Context<'_>) -> anyhow::Result<()> {
    Ok(())
}

/// Search stations by name (default), country, tag or language.
///
/// Examples:
/// • radio search Beatles
/// • radio search country Germany
/// • radio search tag rock
#[poise::command(prefix_command, slash_command)]
async fn search(
    ctx: Context<'_>,
    #[description = "Optionally name, country, tag or language, then the search text"]
    #[rest]
    query: Option<String>,
) -> anyhow::Result<()> {
    let Some(query) = query.as_deref().and_then(SearchQuery::parse) else {
        ctx.say("Please provide something to search for.").await?;
        return Ok(());
    };

    ctx.defer().await?;
    let data = ctx.data();
    let Some(stations) = data.radio.search(&query).await else {
        ctx.say("❌ Could not reach Radio Browser API. Try again later.")
            .await?;
        return Ok(());
    };
    if stations.is_empty() {
        ctx.say(format!(
            "No stations found for **{}: {}**.",
            query.field.param(),
            query.text
        ))
        .await?;
        return Ok(());
    }

    let embed = results_embed(&query, &stations, ctx.prefix());
    data.radio_searches.insert(ctx.author().id, stations);
    ctx.send(CreateReply::default().embed(embed)).await?;
    Ok(())
}

/// Pick one station from your last search results by its number.
#[poise::command(prefix_command, slash_command)]
async fn pick(
    ctx: Context<'_>,
    #[description = "Number of the station in your last search"] number: usize,
) -> anyhow::Result<()> {
    // resolved before replying so the map isn't locked across an await
    let picked = ctx
        .data()
        .radio_searches
        .get(&ctx.author().id)
        .map(|results| {
            number
                .checked_sub(1)
                .and_then(|i| results.get(i))
                .cloned()
                .ok_or(results.len())
        });

    let station = match picked {
        Some(Ok(station)) => station,
        Some(Err(count)) => {
            ctx.say(format!("Pick a number between 1 and {count}."))
                .await?;
            return Ok(());
        }
        None => {
            ctx.say(format!(
                "You have no recent search. Use `{}radio search <query>` first.",
                ctx.prefix()
            ))
            .await?;
            return Ok(());
        }
    };

    ctx.send(CreateReply::default().embed(station_embed(&station)))
        .await?;
    Ok(())
}

/// Fetch a completely random radio station.
#[poise::command(prefix_command, slash_command)]
async fn random(ctx: Context<'_>) -> anyhow::Result<()> {
    ctx.defer().await?;
    match ctx.data().radio.random().await {
        Some(station) => {
            ctx.send(CreateReply::default().embed(random_embed(&station)))
                .await?;
        }
        None => {
            ctx.say("❌ Could not fetch a random station. Try again later.")
                .await?;
        }
    }
    Ok(())
}
