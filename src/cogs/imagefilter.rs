use poise::{serenity_prelude as serenity, CreateReply};
use span_derive::inject_span;

use crate::{
    apis::jeyy::{Filter, MAX_BLUR, MIN_BLUR},
    database, Context,
};

use super::Cog;

const DEFAULT_BLUR: u8 = 5;

pub fn cog() -> Cog {
    Cog::new(vec![imgmanip()], "Images".to_string())
}

fn blur_filter(intensity: u8) -> Result<Filter, String> {
    if (MIN_BLUR..=MAX_BLUR).contains(&intensity) {
        Ok(Filter::Blur(intensity))
    } else {
        Err(format!("Intensity must be {MIN_BLUR}–{MAX_BLUR}."))
    }
}

fn is_image(attachment: &serenity::Attachment) -> bool {
    attachment
        .content_type
        .as_deref()
        .map_or(true, |kind| kind.starts_with("image/"))
}

/// Runs `filter` on the attachment with the author's API key and posts the result.
async fn apply_filter(
    ctx: Context<'_>,
    filter: Filter,
    image: &serenity::Attachment,
    progress: String,
) -> anyhow::Result<()> {
    let data = ctx.data();
    let Some(api_key) = database::filter_key(&data.pool, ctx.author().id.get())? else {
        ctx.say(format!(
            "❌ Set your API key with `{}imgmanip setkey YOUR_KEY`",
            ctx.prefix()
        ))
        .await?;
        return Ok(());
    };
    if !is_image(image) {
        ctx.say("❌ Please attach an image.").await?;
        return Ok(());
    }

    ctx.say(progress).await?;
    match data.jeyy.apply(filter, &image.url, &api_key).await {
        Ok(bytes) => {
            let reply = CreateReply::default()
                .attachment(serenity::CreateAttachment::bytes(bytes, filter.file_name()));
            ctx.send(reply).await?;
        }
        Err(e) => {
            ctx.say(format!("❌ Error: {e}")).await?;
        }
    }
    Ok(())
}

/// Apply image effects using the Jeyy Image API.
#[inject_span]
#[poise::command(
    prefix_command,
    slash_command,
    subcommands("setkey", "blur", "grayscale"),
    subcommand_required
)]
async fn imgmanip(_ctx: Context<'_>) -> anyhow::Result<()> {
    Ok(())
}

/// Store your Jeyy API key.
#[poise::command(prefix_command, slash_command)]
async fn setkey(
    ctx: Context<'_>,
    #[description = "Your Jeyy API key"] api_key: String,
) -> anyhow::Result<()> {
    database::set_filter_key(&ctx.data().pool, ctx.author().id.get(), api_key.trim())?;
    ctx.send(
        CreateReply::default()
            .content("✅ Your Jeyy API key has been saved.")
            .ephemeral(true),
    )
    .await?;
    Ok(())
}

/// Blur the attached image. Intensity 1–20.
#[poise::command(prefix_command, slash_command)]
async fn blur(
    ctx: Context<'_>,
    #[description = "Image to blur"] image: serenity::Attachment,
    #[description = "Blur strength, 1–20"] intensity: Option<u8>,
) -> anyhow::Result<()> {
    let intensity = intensity.unwrap_or(DEFAULT_BLUR);
    let filter = match blur_filter(intensity) {
        Ok(filter) => filter,
        Err(problem) => {
            ctx.say(format!("❌ {problem}")).await?;
            return Ok(());
        }
    };
    apply_filter(
        ctx,
        filter,
        &image,
        format!("🔄 Blurring (intensity={intensity})…"),
    )
    .await
}

/// Convert the attached image to grayscale.
#[poise::command(prefix_command, slash_command)]
async fn grayscale(
    ctx: Context<'_>,
    #[description = "Image to convert"] image: serenity::Attachment,
) -> anyhow::Result<()> {
    apply_filter(
        ctx,
        Filter::Grayscale,
        &image,
        "🔄 Converting to grayscale…".into(),
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blur_intensity_is_bounded() {
        assert_eq!(blur_filter(1), Ok(Filter::Blur(1)));
        assert_eq!(blur_filter(20), Ok(Filter::Blur(20)));
        assert!(blur_filter(0).is_err());
        assert!(blur_filter(21).is_err());
        assert_eq!(blur_filter(DEFAULT_BLUR), Ok(Filter::Blur(5)));
    }
}
