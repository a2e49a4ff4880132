//! Artwork selection for Plex items.
//!
//! Plex hands out image paths rather than tags, and names its hierarchy
//! parent/grandparent. Posters are `thumb`, landscape art is `art`; an
//! episode's own `thumb` is a frame grab, so its poster comes from the show.

use super::types::PlexMetadata;
use crate::models::{ImagePreferences, ImageType, ItemKind, MediaItem, ResolvedImage};

const IMAGE_QUALITY: u32 = 96;

struct Choice<'a> {
    image_type: ImageType,
    path: &'a str,
    owner: Option<&'a str>,
}

fn choice<'a>(image_type: ImageType, path: Option<&'a str>, owner: Option<&'a str>) -> Option<Choice<'a>> {
    Some(Choice {
        image_type,
        path: path.filter(|p| !p.is_empty())?,
        owner,
    })
}

fn when<'a>(condition: bool, f: impl FnOnce() -> Option<Choice<'a>>) -> Option<Choice<'a>> {
    if condition {
        f()
    } else {
        None
    }
}

fn inherited_art(raw: &PlexMetadata) -> Option<Choice<'_>> {
    choice(
        ImageType::Backdrop,
        raw.grandparent_art.as_deref(),
        raw.grandparent_rating_key.as_deref(),
    )
    .or_else(|| {
        choice(
            ImageType::Backdrop,
            raw.parent_art.as_deref(),
            raw.parent_rating_key.as_deref(),
        )
    })
}

fn select<'a>(raw: &'a PlexMetadata, kind: &ItemKind, prefs: &ImagePreferences) -> Option<Choice<'a>> {
    let own_id = raw.rating_key.as_deref();
    let inherit = prefs.inherits_thumb();
    let is_episode = *kind == ItemKind::Episode;
    let is_photo = *kind == ItemKind::Photo;

    when(prefs.prefer_thumb && is_episode, || {
        choice(ImageType::Thumb, raw.thumb.as_deref(), own_id)
    })
    .or_else(|| when(prefs.prefer_banner, || choice(ImageType::Banner, raw.banner.as_deref(), own_id)))
    .or_else(|| {
        when(prefs.prefer_logo, || {
            choice(ImageType::Logo, raw.image_of_type("clearLogo"), own_id)
        })
    })
    .or_else(|| when(prefs.prefer_backdrop, || choice(ImageType::Backdrop, raw.art.as_deref(), own_id)))
    .or_else(|| when(prefs.prefer_backdrop, || inherited_art(raw)))
    .or_else(|| when(prefs.prefer_thumb, || choice(ImageType::Backdrop, raw.art.as_deref(), own_id)))
    .or_else(|| when(prefs.prefer_thumb && inherit && !is_photo, || inherited_art(raw)))
    // Posters.
    .or_else(|| when(!is_episode, || choice(ImageType::Primary, raw.thumb.as_deref(), own_id)))
    .or_else(|| {
        choice(
            ImageType::Primary,
            raw.grandparent_thumb.as_deref(),
            raw.grandparent_rating_key.as_deref(),
        )
    })
    .or_else(|| {
        choice(
            ImageType::Primary,
            raw.parent_thumb.as_deref(),
            raw.parent_rating_key.as_deref(),
        )
    })
    .or_else(|| choice(ImageType::Thumb, raw.thumb.as_deref(), own_id))
    .or_else(|| choice(ImageType::Backdrop, raw.art.as_deref(), own_id))
    .or_else(|| when(inherit, || inherited_art(raw)))
}

fn image_url(base_url: &str, token: &str, path: &str, prefs: &ImagePreferences) -> String {
    if prefs.width.is_none() && prefs.height.is_none() {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        return format!("{}{}?X-Plex-Token={}", base_url, path, urlencoding::encode(token));
    }

    let mut url = format!(
        "{}/photo/:/transcode?url={}&quality={}",
        base_url,
        urlencoding::encode(path),
        IMAGE_QUALITY
    );
    if let Some(width) = prefs.width {
        url.push_str(&format!("&width={}", width));
    }
    if let Some(height) = prefs.height {
        url.push_str(&format!("&height={}", height));
    }
    url.push_str("&minSize=1&upscale=1");
    url.push_str(&format!("&X-Plex-Token={}", urlencoding::encode(token)));
    url
}

pub fn resolve(base_url: &str, token: &str, item: &MediaItem, prefs: &ImagePreferences) -> ResolvedImage {
    let Some(raw) = item.raw.as_plex() else {
        return ResolvedImage::none();
    };
    let Some(choice) = select(raw, &item.kind, prefs) else {
        return ResolvedImage::none();
    };

    ResolvedImage {
        url: Some(image_url(base_url, token, choice.path, prefs)),
        // Plex does not publish placeholder hashes.
        placeholder_hash: None,
        item_id: choice.owner.map(str::to_string),
        image_type: Some(choice.image_type),
    }
}
