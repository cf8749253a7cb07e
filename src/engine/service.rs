use super::policy::SampleTally;
use super::types::{Item, ItemKind, Reason, Verdict};
use crate::config::Settings;
use crate::fetcher::UpstreamAccess;
use crate::ident;
use crate::resolver::{IdentityResolver, ResolveError};
use crate::settings::SettingsStore;
use crate::stats::StatsCollector;
use futures::{stream, StreamExt};
use rustc_hash::{FxHashMap, FxHashSet};
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Playlists sampled at the same time within one batch.
const PLAYLIST_CONCURRENCY: usize = 4;

/// Request-facing façade. Never fails: every requested id gets a verdict,
/// and collaborator failures become non-blocking verdicts.
#[derive(Clone)]
pub struct DecisionService {
    resolver: Arc<IdentityResolver>,
    settings: Arc<SettingsStore>,
    stats: Arc<StatsCollector>,
}

impl DecisionService {
    pub fn new(
        resolver: Arc<IdentityResolver>,
        settings: Arc<SettingsStore>,
        stats: Arc<StatsCollector>,
    ) -> Self {
        Self {
            resolver,
            settings,
            stats,
        }
    }

    pub fn settings(&self) -> &Arc<SettingsStore> {
        &self.settings
    }

    pub fn resolver(&self) -> &Arc<IdentityResolver> {
        &self.resolver
    }

    pub async fn check_video(&self, id: &str) -> Verdict {
        let mut verdicts = self.check_videos(&[id.to_string()]).await;
        verdicts
            .remove(id)
            .unwrap_or_else(|| Verdict::allowed(Reason::NotFound))
    }

    pub async fn check_videos(&self, ids: &[String]) -> FxHashMap<String, Verdict> {
        self.check_kind(ItemKind::Video, ids).await
    }

    pub async fn check_playlists(&self, ids: &[String]) -> FxHashMap<String, Verdict> {
        self.check_kind(ItemKind::Playlist, ids).await
    }

    pub async fn check_items(&self, items: &[Item]) -> FxHashMap<String, Verdict> {
        let settings = self.settings.snapshot();
        self.decide_batch(items, &settings).await
    }

    /// Keys are the URLs as given; unrecognised URLs are `NotFound`.
    pub async fn check_urls(&self, urls: &[String]) -> FxHashMap<String, Verdict> {
        let parsed: Vec<(String, Option<Item>)> = urls
            .iter()
            .map(|url| (url.clone(), ident::parse(url)))
            .collect();
        let items: Vec<Item> = parsed.iter().filter_map(|(_, item)| item.clone()).collect();
        let verdicts = self.check_items(&items).await;

        parsed
            .into_iter()
            .map(|(url, item)| {
                let verdict = item
                    .and_then(|item| verdicts.get(&item.id).cloned())
                    .unwrap_or_else(|| Verdict::allowed(Reason::NotFound));
                (url, verdict)
            })
            .collect()
    }

    async fn check_kind(&self, kind: ItemKind, ids: &[String]) -> FxHashMap<String, Verdict> {
        let items: Vec<Item> = ids.iter().map(|id| Item::new(kind, id.clone())).collect();
        self.check_items(&items).await
    }

    /// Decides a mixed batch against one settings snapshot.
    pub async fn decide_batch(
        &self,
        items: &[Item],
        settings: &Settings,
    ) -> FxHashMap<String, Verdict> {
        let mut seen = FxHashSet::default();
        let mut by_kind: FxHashMap<ItemKind, Vec<String>> = FxHashMap::default();
        for item in items {
            if seen.insert((item.kind, item.id.as_str())) {
                by_kind.entry(item.kind).or_default().push(item.id.clone());
            }
        }
        debug!("Decision batch: {} items ({} unique)", items.len(), seen.len());

        let mut result = FxHashMap::default();
        if settings.is_lookup_disabled() {
            for (_, ids) in by_kind {
                for id in ids {
                    result.insert(id, Verdict::allowed(Reason::NoCredential));
                }
            }
            self.record(&result);
            return result;
        }

        for (kind, ids) in by_kind {
            let verdicts = match kind {
                ItemKind::Playlist => Ok(self.decide_playlists(&ids, settings).await),
                _ => self.resolver.decide_many(kind, &ids, settings).await,
            };
            match verdicts {
                Ok(verdicts) => result.extend(verdicts),
                Err(e) => {
                    warn!("{:?} batch of {} failed open: {}", kind, ids.len(), e);
                    let fallback = e.verdict();
                    for id in ids {
                        result.entry(id).or_insert_with(|| fallback.clone());
                    }
                }
            }
        }

        self.record(&result);
        result
    }

    /// Owners are resolved for the whole batch; sampling runs per playlist.
    async fn decide_playlists(
        &self,
        ids: &[String],
        settings: &Settings,
    ) -> FxHashMap<String, Verdict> {
        let owners = match self.playlist_owner_verdicts(ids, settings).await {
            Ok(owners) => owners,
            Err(e) => {
                warn!("Playlist owner lookup for {} ids failed open: {}", ids.len(), e);
                let fallback = e.verdict();
                return ids.iter().map(|id| (id.clone(), fallback.clone())).collect();
            }
        };

        let owners = &owners;
        stream::iter(ids.iter().cloned())
            .map(|id| async move {
                let owner = owners.get(&id).and_then(Option::as_ref);
                let verdict = match self.decide_playlist(&id, owner, settings).await {
                    Ok(verdict) => verdict,
                    Err(e) => {
                        warn!("Playlist {} failed open: {}", id, e);
                        e.verdict()
                    }
                };
                (id, verdict)
            })
            .buffer_unordered(PLAYLIST_CONCURRENCY)
            .collect()
            .await
    }

    /// `None` for playlists whose owner channel could not be resolved.
    async fn playlist_owner_verdicts(
        &self,
        ids: &[String],
        settings: &Settings,
    ) -> Result<FxHashMap<String, Option<Verdict>>, ResolveError> {
        let access = UpstreamAccess::from_settings(settings);
        let owner_of = self.resolver.resolve_playlist_owner(ids, &access).await?;

        let mut channel_ids: Vec<String> = owner_of.values().flatten().cloned().collect();
        channel_ids.sort();
        channel_ids.dedup();
        let channel_verdicts = self
            .resolver
            .decide_many(ItemKind::Channel, &channel_ids, settings)
            .await?;

        Ok(ids
            .iter()
            .map(|id| {
                let verdict = owner_of
                    .get(id)
                    .cloned()
                    .flatten()
                    .and_then(|channel_id| channel_verdicts.get(&channel_id).cloned());
                (id.clone(), verdict)
            })
            .collect())
    }

    async fn decide_playlist(
        &self,
        playlist_id: &str,
        owner: Option<&Verdict>,
        settings: &Settings,
    ) -> Result<Verdict, ResolveError> {
        let policy = settings.playlist_policy;
        if !policy.needs_sample() {
            return Ok(policy.evaluate(owner, SampleTally::default()));
        }

        let access = UpstreamAccess::from_settings(settings);
        let members = self
            .resolver
            .list_playlist_members(playlist_id, settings.sample_size(), &access)
            .await?;

        let tally = if members.is_empty() {
            SampleTally::default()
        } else {
            let verdicts = self
                .resolver
                .decide_many(ItemKind::Video, &members, settings)
                .await?;
            SampleTally::from_verdicts(members.iter().filter_map(|id| verdicts.get(id)))
        };
        debug!(
            "Playlist {}: {} of {} sampled videos blocked",
            playlist_id, tally.blocked, tally.sampled
        );

        Ok(policy.evaluate(owner, tally))
    }

    fn record(&self, verdicts: &FxHashMap<String, Verdict>) {
        self.stats.inc_decisions(verdicts.len() as u64);
        let mut failed = 0;
        for verdict in verdicts.values() {
            if verdict.blocked {
                self.stats.inc_blocked();
            }
            if matches!(verdict.reason, Reason::FetchFailed | Reason::Error) {
                failed += 1;
            }
        }
        if failed > 0 {
            error!("{} of {} verdicts failed open", failed, verdicts.len());
            self.stats.inc_fail_open(failed);
        }
    }
}
