use anyhow::Context as _;
use poise::{serenity_prelude as serenity, CreateReply};
use rand::Rng;
use span_derive::inject_span;
use tracing::{debug, error};

use crate::{
    database::{self, StoreError},
    util::{is_web_url, split_items},
    Context,
};

use super::Cog;

const DEFAULT_FRAMES: usize = 30;
const MAX_FRAMES: usize = 60;
const DEFAULT_DURATION: f64 = 3.0;
const MAX_DURATION: f64 = 15.0;
/// GIF players stretch frames shorter than this, so slower spins are required instead.
const MIN_FRAME_DELAY_CS: usize = 2;
const MESSAGE_LIMIT: usize = 2000;

pub fn cog() -> Cog {
    Cog::new(vec![pickerwheel()], "Wheels".to_string())
}

fn wheel_key(name: &str) -> String {
    name.trim().to_lowercase()
}

fn guild_key(ctx: Context<'_>) -> anyhow::Result<u64> {
    ctx.guild_id()
        .map(|id| id.get())
        .context("wheels only exist inside servers")
}

/// Tells the user what was wrong with their arguments, or propagates database failures.
async fn report(ctx: Context<'_>, err: StoreError) -> anyhow::Result<()> {
    if err.is_user_error() {
        ctx.say(format!("❌ {err}")).await?;
        Ok(())
    } else {
        Err(err.into())
    }
}

/// Joins `lines` under `header`, leaving out whatever would not fit in one message.
fn paginate(header: &str, lines: impl ExactSizeIterator<Item = String>) -> String {
    let total = lines.len();
    let mut message = header.to_string();
    for (shown, line) in lines.enumerate() {
        // room for the "…and N more" trailer
        if message.len() + line.len() + 1 > MESSAGE_LIMIT - 32 {
            message.push_str(&format!("\n…and {} more", total - shown));
            break;
        }
        message.push('\n');
        message.push_str(&line);
    }
    message
}

fn added_summary(key: &str, items: &[String]) -> String {
    paginate(
        &format!("✅ Added {} to **{key}**:", items.len()),
        items.iter().map(|item| format!("- **{item}**")),
    )
}

fn validate_spin(frames: usize, duration: f64) -> Result<(), String> {
    if !(2..=MAX_FRAMES).contains(&frames) {
        return Err(format!("Frames must be between 2 and {MAX_FRAMES}."));
    }
    if !(duration.is_finite() && duration > 0.0 && duration <= MAX_DURATION) {
        return Err(format!(
            "Duration must be more than 0 and at most {MAX_DURATION} seconds."
        ));
    }
    let min_cs = frames * MIN_FRAME_DELAY_CS;
    if ((duration * 100.0).round() as usize) < min_cs {
        return Err(format!(
            "{frames} frames need a duration of at least {:.2} seconds.",
            min_cs as f64 / 100.0
        ));
    }
    Ok(())
}

/// Create, manage, and spin named wheels.
#[inject_span]
#[poise::command(
    prefix_command,
    slash_command,
    guild_only,
    subcommands("create", "delete", "list", "add", "remove", "clear", "image", "spin"),
    subcommand_required
)]
async fn pickerwheel(_ctx: Context<'_>) -> anyhow::Result<()> {
    Ok(())
}

/// Create a new wheel with the given name.
#[poise::command(
    prefix_command,
    slash_command,
    guild_only,
    required_permissions = "ADMINISTRATOR"
)]
async fn create(
    ctx: Context<'_>,
    #[description = "Name of the new wheel"] name: String,
) -> anyhow::Result<()> {
    let key = wheel_key(&name);
    match database::create_wheel(&ctx.data().pool, guild_key(ctx)?, &key) {
        Ok(()) => {
            ctx.say(format!("✅ Created wheel **{key}**.")).await?;
            Ok(())
        }
        Err(e) => report(ctx, e).await,
    }
}

/// Delete the wheel and all its options.
#[poise::command(
    prefix_command,
    slash_command,
    guild_only,
    required_permissions = "ADMINISTRATOR"
)]
async fn delete(
    ctx: Context<'_>,
    #[description = "Wheel to delete"] name: String,
) -> anyhow::Result<()> {
    let key = wheel_key(&name);
    match database::delete_wheel(&ctx.data().pool, guild_key(ctx)?, &key) {
        Ok(()) => {
            ctx.say(format!("🗑 Deleted wheel **{key}**.")).await?;
            Ok(())
        }
        Err(e) => report(ctx, e).await,
    }
}

/// List wheels, or the options of one wheel.
///
/// Without a name, shows every wheel and how many options it has.
#[poise::command(
    prefix_command,
    slash_command,
    guild_only,
    required_permissions = "ADMINISTRATOR"
)]
async fn list(
    ctx: Context<'_>,
    #[description = "Wheel to show the options of"] name: Option<String>,
) -> anyhow::Result<()> {
    let pool = &ctx.data().pool;
    let guild = guild_key(ctx)?;

    let Some(name) = name else {
        let wheels = database::list_wheels(pool, guild)?;
        if wheels.is_empty() {
            ctx.say("No wheels exist. Create one with `pickerwheel create`.")
                .await?;
        } else {
            let lines = wheels
                .into_iter()
                .map(|(wheel, count)| format!("{wheel}: {count} items"));
            ctx.say(paginate("**Saved wheels:**", lines)).await?;
        }
        return Ok(());
    };

    let key = wheel_key(&name);
    let options = match database::wheel_options(pool, guild, &key) {
        Ok(options) => options,
        Err(e) => return report(ctx, e).await,
    };
    if options.is_empty() {
        ctx.say(format!("Wheel **{key}** is empty.")).await?;
    } else {
        let lines = options
            .iter()
            .enumerate()
            .map(|(i, item)| format!("{}. {item}", i + 1));
        ctx.say(paginate(&format!("**Options in {key}:**"), lines))
            .await?;
    }
    Ok(())
}

/// Add one or more options to a wheel.
///
/// Separate items with commas or semicolons.
#[poise::command(
    prefix_command,
    slash_command,
    guild_only,
    required_permissions = "ADMINISTRATOR"
)]
async fn add(
    ctx: Context<'_>,
    #[description = "Wheel to add to"] name: String,
    #[description = "Items separated by commas or semicolons"]
    #[rest]
    items: String,
) -> anyhow::Result<()> {
    let key = wheel_key(&name);
    let items = split_items(&items);
    if items.is_empty() {
        ctx.say("❌ Give at least one item, separated by commas or semicolons.")
            .await?;
        return Ok(());
    }

    match database::add_options(&ctx.data().pool, guild_key(ctx)?, &key, &items) {
        Ok(()) => {
            ctx.say(added_summary(&key, &items)).await?;
            Ok(())
        }
        Err(e) => report(ctx, e).await,
    }
}

/// Remove an option from a wheel by its number in `list`.
#[poise::command(
    prefix_command,
    slash_command,
    guild_only,
    required_permissions = "ADMINISTRATOR"
)]
async fn remove(
    ctx: Context<'_>,
    #[description = "Wheel to remove from"] name: String,
    #[description = "Number of the option, starting at 1"] index: usize,
) -> anyhow::Result<()> {
    let key = wheel_key(&name);
    match database::remove_option(&ctx.data().pool, guild_key(ctx)?, &key, index) {
        Ok(removed) => {
            ctx.say(format!("🗑 Removed **{removed}** from **{key}**."))
                .await?;
            Ok(())
        }
        Err(e) => report(ctx, e).await,
    }
}

/// Clear all options from a wheel.
#[poise::command(
    prefix_command,
    slash_command,
    guild_only,
    required_permissions = "ADMINISTRATOR"
)]
async fn clear(
    ctx: Context<'_>,
    #[description = "Wheel to clear"] name: String,
) -> anyhow::Result<()> {
    let key = wheel_key(&name);
    match database::clear_options(&ctx.data().pool, guild_key(ctx)?, &key) {
        Ok(()) => {
            ctx.say(format!("🧹 Cleared wheel **{key}**.")).await?;
            Ok(())
        }
        Err(e) => report(ctx, e).await,
    }
}

/// Set or clear the background image of an option's slice.
///
/// Leave out the URL to go back to a plain colored slice.
#[poise::command(
    prefix_command,
    slash_command,
    guild_only,
    required_permissions = "ADMINISTRATOR"
)]
async fn image(
    ctx: Context<'_>,
    #[description = "Wheel the option belongs to"] name: String,
    #[description = "Number of the option, starting at 1"] index: usize,
    #[description = "Image URL"] url: Option<String>,
) -> anyhow::Result<()> {
    let pool = &ctx.data().pool;
    let guild = guild_key(ctx)?;
    let key = wheel_key(&name);

    let options = match database::wheel_options(pool, guild, &key) {
        Ok(options) => options,
        Err(e) => return report(ctx, e).await,
    };
    let Some(label) = index.checked_sub(1).and_then(|i| options.get(i)) else {
        return report(ctx, StoreError::InvalidIndex).await;
    };
    if let Some(url) = &url {
        if !is_web_url(url) {
            ctx.say("❌ The image must be an http(s) URL.").await?;
            return Ok(());
        }
    }

    match database::set_image(pool, guild, &key, label, url.as_deref()) {
        Ok(()) if url.is_some() => {
            ctx.say(format!("🖼 Set the image for **{label}** in **{key}**."))
                .await?;
            Ok(())
        }
        Ok(()) => {
            ctx.say(format!("🧹 Cleared the image for **{label}** in **{key}**."))
                .await?;
            Ok(())
        }
        Err(e) => report(ctx, e).await,
    }
}

/// Spin a wheel.
///
/// frames: total frames in the GIF
/// duration: total seconds of animation
#[poise::command(prefix_command, slash_command, guild_only)]
async fn spin(
    ctx: Context<'_>,
    #[description = "Wheel to spin"] name: String,
    #[description = "Total frames in the animation"] frames: Option<usize>,
    #[description = "Length of the animation in seconds"] duration: Option<f64>,
) -> anyhow::Result<()> {
    let data = ctx.data();
    let guild = guild_key(ctx)?;
    let key = wheel_key(&name);
    let frames = frames.unwrap_or(DEFAULT_FRAMES);
    let duration = duration.unwrap_or(DEFAULT_DURATION);

    if let Err(problem) = validate_spin(frames, duration) {
        ctx.say(format!("❌ {problem}")).await?;
        return Ok(());
    }

    let options = match database::wheel_options(&data.pool, guild, &key) {
        Ok(options) => options,
        Err(e) => return report(ctx, e).await,
    };
    if options.len() < 2 {
        ctx.say("Need at least two options to spin.").await?;
        return Ok(());
    }
    let images = database::wheel_images(&data.pool, guild, &key)?;
    let winner = rand::thread_rng().gen_range(0..options.len());

    ctx.defer().await?;
    match data
        .wheel
        .render(&options, winner, frames, duration, Some(&images))
        .await
    {
        Ok(gif) => {
            debug!(
                "Spun wheel {key} in guild {guild}; {} slice images cached",
                data.wheel.images().len()
            );
            let reply = CreateReply::default()
                .content(format!("🎉 **{key}** stops on **{}**!", options[winner]))
                .attachment(serenity::CreateAttachment::bytes(gif, "wheel.gif"));
            ctx.send(reply).await?;
        }
        Err(e) => {
            error!("Could not render wheel {key} in guild {guild}: {e}");
            ctx.say(format!("❌ Could not spin **{key}**: {e}")).await?;
        }
    }
    Ok(())
}
