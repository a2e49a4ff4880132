//! Artwork selection for Jellyfin items.
//!
//! Pure function of the already-fetched payload. The candidates are tried
//! in a fixed order and the first one that exists wins; inherited images
//! are addressed through the item that owns them.

use super::types::JellyfinItem;
use crate::models::{ImagePreferences, ImageType, ItemKind, MediaItem, ResolvedImage};

const IMAGE_QUALITY: u32 = 96;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Choice<'a> {
    image_type: ImageType,
    tag: &'a str,
    owner: &'a str,
}

fn choice<'a>(image_type: ImageType, tag: Option<&'a str>, owner: Option<&'a str>) -> Option<Choice<'a>> {
    Some(Choice {
        image_type,
        tag: tag.filter(|t| !t.is_empty())?,
        owner: owner.filter(|o| !o.is_empty())?,
    })
}

fn own<'a>(raw: &'a JellyfinItem, image_type: ImageType) -> Option<Choice<'a>> {
    choice(image_type, raw.image_tag(image_type.as_str()), raw.id.as_deref())
}

fn own_backdrop(raw: &JellyfinItem) -> Option<Choice<'_>> {
    choice(ImageType::Backdrop, raw.first_backdrop(), raw.id.as_deref())
}

fn parent_backdrop(raw: &JellyfinItem) -> Option<Choice<'_>> {
    choice(
        ImageType::Backdrop,
        raw.first_parent_backdrop(),
        raw.parent_backdrop_item_id.as_deref(),
    )
}

fn series_thumb(raw: &JellyfinItem) -> Option<Choice<'_>> {
    choice(
        ImageType::Thumb,
        raw.series_thumb_image_tag.as_deref(),
        raw.series_id.as_deref(),
    )
}

fn parent_thumb(raw: &JellyfinItem) -> Option<Choice<'_>> {
    choice(
        ImageType::Thumb,
        raw.parent_thumb_image_tag.as_deref(),
        raw.parent_thumb_item_id.as_deref(),
    )
}

fn when<'a>(condition: bool, f: impl FnOnce() -> Option<Choice<'a>>) -> Option<Choice<'a>> {
    if condition {
        f()
    } else {
        None
    }
}

fn select<'a>(raw: &'a JellyfinItem, kind: &ItemKind, prefs: &ImagePreferences) -> Option<Choice<'a>> {
    let inherit = prefs.inherits_thumb();
    let is_episode = *kind == ItemKind::Episode;
    let is_photo = *kind == ItemKind::Photo || raw.media_type.as_deref() == Some("Photo");

    // Explicit hints against the item's own images.
    when(prefs.prefer_thumb, || own(raw, ImageType::Thumb))
        .or_else(|| when(prefs.prefer_banner, || own(raw, ImageType::Banner)))
        .or_else(|| when(prefs.prefer_logo, || own(raw, ImageType::Logo)))
        .or_else(|| when(prefs.prefer_backdrop, || own_backdrop(raw)))
        // Logo and backdrop owned further up the hierarchy.
        .or_else(|| {
            when(prefs.prefer_logo, || {
                choice(
                    ImageType::Logo,
                    raw.parent_logo_image_tag.as_deref(),
                    raw.parent_logo_item_id.as_deref(),
                )
            })
        })
        .or_else(|| when(prefs.prefer_backdrop, || parent_backdrop(raw)))
        // Thumb inheritance; photos never borrow a thumb.
        .or_else(|| when(prefs.prefer_thumb && inherit, || series_thumb(raw)))
        .or_else(|| when(prefs.prefer_thumb && inherit && !is_photo, || parent_thumb(raw)))
        .or_else(|| when(prefs.prefer_thumb, || own_backdrop(raw)))
        .or_else(|| when(prefs.prefer_thumb && inherit && is_episode, || parent_backdrop(raw)))
        // Primary. An episode skips its own primary when it reports zero children.
        .or_else(|| when(!is_episode || raw.child_count != Some(0), || own(raw, ImageType::Primary)))
        .or_else(|| {
            choice(
                ImageType::Primary,
                raw.series_primary_image_tag.as_deref(),
                raw.series_id.as_deref(),
            )
        })
        .or_else(|| {
            choice(
                ImageType::Primary,
                raw.parent_primary_image_tag.as_deref(),
                raw.parent_primary_image_item_id.as_deref(),
            )
        })
        .or_else(|| {
            choice(
                ImageType::Primary,
                raw.primary_image_tag.as_deref(),
                raw.primary_image_item_id.as_deref().or(raw.id.as_deref()),
            )
        })
        .or_else(|| {
            choice(
                ImageType::Primary,
                raw.album_primary_image_tag.as_deref(),
                raw.album_id.as_deref(),
            )
        })
        .or_else(|| when(*kind == ItemKind::Season, || own(raw, ImageType::Thumb)))
        // Anything left over.
        .or_else(|| own_backdrop(raw))
        .or_else(|| own(raw, ImageType::Thumb))
        .or_else(|| when(inherit, || series_thumb(raw)))
        .or_else(|| when(inherit && !is_photo, || parent_thumb(raw)))
        .or_else(|| when(inherit, || parent_backdrop(raw)))
}

pub fn image_url(base_url: &str, owner: &str, image_type: ImageType, tag: &str, prefs: &ImagePreferences) -> String {
    let mut url = format!(
        "{}/Items/{}/Images/{}?tag={}&quality={}",
        base_url,
        urlencoding::encode(owner),
        image_type.as_str(),
        urlencoding::encode(tag),
        IMAGE_QUALITY
    );
    if let Some(width) = prefs.width {
        url.push_str(&format!("&maxWidth={}", width));
    }
    if let Some(height) = prefs.height {
        url.push_str(&format!("&maxHeight={}", height));
    }
    url
}

pub fn resolve(base_url: &str, item: &MediaItem, prefs: &ImagePreferences) -> ResolvedImage {
    let Some(raw) = item.raw.as_jellyfin() else {
        return ResolvedImage::none();
    };
    let Some(choice) = select(raw, &item.kind, prefs) else {
        return ResolvedImage::none();
    };

    ResolvedImage {
        url: Some(image_url(base_url, choice.owner, choice.image_type, choice.tag, prefs)),
        placeholder_hash: raw
            .blur_hash(choice.image_type.as_str(), choice.tag)
            .map(str::to_string),
        item_id: Some(choice.owner.to_string()),
        image_type: Some(choice.image_type),
    }
}
