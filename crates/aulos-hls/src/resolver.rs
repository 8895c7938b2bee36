//! Manifest resolution and variant selection.
//!
//! Fetches a manifest, classifies master vs media, applies the quality
//! policy and produces a [`ResolvedStream`] pointing at one media playlist.

use aulos_m3u8::{
    parse_playlist, MasterPlaylist, MediaPlaylist, MediaRendition, Playlist, RenditionType, Variant,
};
use aulos_net::NetClient;
use tracing::debug;
use url::Url;

use crate::{
    error::{HlsError, HlsResult},
    util::resolve_url,
};

/// Variant selection policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QualitySelection {
    /// Maximum bandwidth after filtering.
    Highest,
    /// Minimum bandwidth.
    Lowest,
    /// Alias for `Highest`.
    Auto,
    /// Minimum absolute bandwidth distance to the target.
    ByBandwidth { target: u64 },
    /// Minimum resolution distance; falls back to `Highest` when no variant
    /// advertises a resolution.
    ByResolution { width: u32, height: u32 },
}

impl Default for QualitySelection {
    fn default() -> Self {
        Self::Auto
    }
}

/// One manifest URL resolved down to a single media playlist.
#[derive(Debug, Clone)]
pub struct ResolvedStream {
    /// The manifest URL everything was resolved against.
    pub base_url: Url,
    /// URL of the selected media playlist (equals `base_url` for a
    /// media-only manifest).
    pub media_url: Url,
    pub media: MediaPlaylist,
    pub master: Option<MasterPlaylist>,
    /// Index into `master.variants`, when a master was involved.
    pub selected_variant: Option<usize>,
    /// Audio renditions in the group referenced by the selected variant.
    pub audio_renditions: Vec<MediaRendition>,
    pub subtitle_renditions: Vec<MediaRendition>,
    pub is_live: bool,
}

impl ResolvedStream {
    pub fn variant(&self) -> Option<&Variant> {
        let master = self.master.as_ref()?;
        master.variants.get(self.selected_variant?)
    }
}

/// Fetches and resolves manifests through an injectable [`NetClient`].
#[derive(Clone)]
pub struct ManifestResolver {
    net: NetClient,
}

impl ManifestResolver {
    pub fn new(net: NetClient) -> Self {
        Self { net }
    }

    /// Resolve a manifest URL down to one media playlist per the policy.
    pub async fn resolve(
        &self,
        manifest_url: Url,
        selection: QualitySelection,
    ) -> HlsResult<ResolvedStream> {
        let bytes = self.net.get_bytes(manifest_url.clone(), None).await?;
        let text = String::from_utf8_lossy(&bytes);

        match parse_playlist(&text)? {
            Playlist::Media(media) => {
                let is_live = media.is_live();
                Ok(ResolvedStream {
                    base_url: manifest_url.clone(),
                    media_url: manifest_url,
                    media,
                    master: None,
                    selected_variant: None,
                    audio_renditions: Vec::new(),
                    subtitle_renditions: Vec::new(),
                    is_live,
                })
            }
            Playlist::Master(master) => self.resolve_master(manifest_url, master, selection).await,
        }
    }

    async fn resolve_master(
        &self,
        manifest_url: Url,
        master: MasterPlaylist,
        selection: QualitySelection,
    ) -> HlsResult<ResolvedStream> {
        let index = select_variant(&master.variants, selection).ok_or(HlsError::NoVariants)?;
        let variant = &master.variants[index];

        debug!(
            index,
            bandwidth = variant.bandwidth,
            uri = %variant.uri,
            ?selection,
            "selected variant"
        );

        let media_url = resolve_url(&manifest_url, &variant.uri)?;
        let bytes = self.net.get_bytes(media_url.clone(), None).await?;
        let text = String::from_utf8_lossy(&bytes);

        let media = match parse_playlist(&text)? {
            Playlist::Media(media) => media,
            Playlist::Master(_) => {
                return Err(HlsError::UnsupportedMedia(
                    "variant URI resolved to another master playlist".into(),
                ));
            }
        };

        let audio_renditions = renditions_for_group(
            &master,
            RenditionType::Audio,
            variant.audio.as_deref(),
        );
        let subtitle_renditions = renditions_for_group(
            &master,
            RenditionType::Subtitles,
            variant.subtitles.as_deref(),
        );

        let is_live = media.is_live();
        Ok(ResolvedStream {
            base_url: manifest_url,
            media_url,
            media,
            master: Some(master),
            selected_variant: Some(index),
            audio_renditions,
            subtitle_renditions,
            is_live,
        })
    }
}

fn renditions_for_group(
    master: &MasterPlaylist,
    media_type: RenditionType,
    group_id: Option<&str>,
) -> Vec<MediaRendition> {
    let Some(group_id) = group_id else {
        return Vec::new();
    };
    master
        .renditions
        .iter()
        .filter(|r| r.media_type == media_type && r.group_id == group_id)
        .cloned()
        .collect()
}

/// Pick a variant index per the policy. Dolby-only variants (`ec-3` / `ac-3`
/// codecs) are demoted behind widely-supported ones; ties resolve to the
/// first variant in manifest order.
pub fn select_variant(variants: &[Variant], selection: QualitySelection) -> Option<usize> {
    if variants.is_empty() {
        return None;
    }

    let non_dolby: Vec<usize> = (0..variants.len())
        .filter(|&i| !variants[i].has_dolby_codec())
        .collect();
    let candidates: Vec<usize> = if non_dolby.is_empty() {
        (0..variants.len()).collect()
    } else {
        non_dolby
    };

    let pick_by_key = |key: &dyn Fn(usize) -> i64| -> usize {
        // Strict comparison keeps the first candidate on ties.
        let mut best = candidates[0];
        let mut best_key = key(best);
        for &i in &candidates[1..] {
            let k = key(i);
            if k < best_key {
                best = i;
                best_key = k;
            }
        }
        best
    };

    let index = match selection {
        QualitySelection::Highest | QualitySelection::Auto => {
            pick_by_key(&|i| -(variants[i].bandwidth as i64))
        }
        QualitySelection::Lowest => pick_by_key(&|i| variants[i].bandwidth as i64),
        QualitySelection::ByBandwidth { target } => {
            pick_by_key(&|i| (variants[i].bandwidth as i64 - target as i64).abs())
        }
        QualitySelection::ByResolution { width, height } => {
            let with_resolution: Vec<usize> = candidates
                .iter()
                .copied()
                .filter(|&i| variants[i].resolution.is_some())
                .collect();
            if with_resolution.is_empty() {
                return select_variant_from(&candidates, variants, QualitySelection::Highest);
            }
            let mut best = with_resolution[0];
            let mut best_key = resolution_distance(&variants[best], width, height);
            for &i in &with_resolution[1..] {
                let k = resolution_distance(&variants[i], width, height);
                if k < best_key {
                    best = i;
                    best_key = k;
                }
            }
            best
        }
    };

    Some(index)
}

fn select_variant_from(
    candidates: &[usize],
    variants: &[Variant],
    selection: QualitySelection,
) -> Option<usize> {
    debug_assert!(matches!(selection, QualitySelection::Highest));
    candidates.iter().copied().fold(None, |best, i| match best {
        None => Some(i),
        Some(b) if variants[i].bandwidth > variants[b].bandwidth => Some(i),
        Some(b) => Some(b),
    })
}

fn resolution_distance(variant: &Variant, width: u32, height: u32) -> i64 {
    match variant.resolution {
        Some(resolution) => {
            (resolution.width as i64 - width as i64).abs()
                + (resolution.height as i64 - height as i64).abs()
        }
        None => i64::MAX,
    }
}

#[cfg(test)]
mod tests {
    use aulos_m3u8::Resolution;
    use rstest::{fixture, rstest};

    use super::*;

    fn variant(bandwidth: u64, resolution: Option<(u32, u32)>, codecs: Option<&str>) -> Variant {
        Variant {
            uri: format!("v{bandwidth}.m3u8"),
            bandwidth,
            resolution: resolution.map(|(width, height)| Resolution { width, height }),
            codecs: codecs.map(str::to_string),
            ..Variant::default()
        }
    }

    #[fixture]
    fn ladder() -> Vec<Variant> {
        vec![
            variant(1_280_000, Some((854, 480)), Some("avc1.42c01e,mp4a.40.2")),
            variant(2_560_000, Some((1280, 720)), Some("avc1.42c01e,mp4a.40.2")),
            variant(5_120_000, Some((1920, 1080)), Some("avc1.640028,mp4a.40.2")),
        ]
    }

    #[rstest]
    #[case(QualitySelection::Highest, 2)]
    #[case(QualitySelection::Auto, 2)]
    #[case(QualitySelection::Lowest, 0)]
    #[case(QualitySelection::ByBandwidth { target: 2_000_000 }, 1)]
    #[case(QualitySelection::ByBandwidth { target: 100_000 }, 0)]
    #[case(QualitySelection::ByResolution { width: 1280, height: 720 }, 1)]
    #[case(QualitySelection::ByResolution { width: 4000, height: 2000 }, 2)]
    fn selection_policies(
        ladder: Vec<Variant>,
        #[case] selection: QualitySelection,
        #[case] expected: usize,
    ) {
        assert_eq!(select_variant(&ladder, selection), Some(expected));
    }

    #[test]
    fn empty_variant_list_selects_nothing() {
        assert_eq!(select_variant(&[], QualitySelection::Highest), None);
    }

    #[test]
    fn ties_resolve_to_manifest_order() {
        let variants = vec![
            variant(1_000_000, None, None),
            variant(1_000_000, None, None),
        ];
        assert_eq!(select_variant(&variants, QualitySelection::Highest), Some(0));
        assert_eq!(
            select_variant(&variants, QualitySelection::ByBandwidth { target: 1_000_000 }),
            Some(0)
        );
    }

    #[test]
    fn dolby_variants_are_demoted() {
        let variants = vec![
            variant(8_000_000, None, Some("avc1.640028,ec-3")),
            variant(2_000_000, None, Some("avc1.42c01e,mp4a.40.2")),
        ];
        // The Dolby variant has higher bandwidth but loses to the supported set.
        assert_eq!(select_variant(&variants, QualitySelection::Highest), Some(1));
    }

    #[test]
    fn all_dolby_falls_back_to_full_set() {
        let variants = vec![
            variant(1_000_000, None, Some("ec-3")),
            variant(2_000_000, None, Some("ac-3")),
        ];
        assert_eq!(select_variant(&variants, QualitySelection::Highest), Some(1));
    }

    #[test]
    fn by_resolution_without_any_resolution_falls_back_to_highest() {
        let variants = vec![
            variant(1_000_000, None, None),
            variant(3_000_000, None, None),
        ];
        assert_eq!(
            select_variant(
                &variants,
                QualitySelection::ByResolution { width: 1280, height: 720 }
            ),
            Some(1)
        );
    }
}
