//! Achievement Web API client
//!
//! Every call authenticates with the `z` (username) and `y` (API key) query
//! parameters. Responses are mapped into the normalized models by the pure
//! `map_*` functions below so they can be tested without a network.

use async_trait::async_trait;
use cheevo_core::*;
use reqwest::StatusCode;
use serde_json::Value;
use std::time::Duration;

use crate::api_fields::{bool_field, field, i64_field, media_url, str_field, time_field, u64_field};
use crate::config::Config;

const API_USER_SUMMARY: &str = "API_GetUserSummary";
const API_GAME_PROGRESS: &str = "API_GetGameInfoAndUserProgress";
const API_RECENT_UNLOCKS: &str = "API_GetUserRecentAchievements";
const API_GAME_LEADERBOARDS: &str = "API_GetGameLeaderboards";
const API_LEADERBOARD_ENTRIES: &str = "API_GetLeaderboardEntries";
const API_USER_LEADERBOARDS: &str = "API_GetUserGameLeaderboards";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

pub struct ApiClient {
    http: reqwest::Client,
    api_base: String,
    media_base: String,
    username: String,
    api_key: String,
}

impl ApiClient {
    pub fn new(config: &Config) -> ProviderResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("cheevo-overlay/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ProviderError::Transient(format!("HTTP client setup failed: {}", e)))?;

        Ok(Self {
            http,
            api_base: config.api_base_url.trim_end_matches('/').to_string(),
            media_base: config.media_base_url.clone(),
            username: config.username.clone(),
            api_key: config.api_key.clone(),
        })
    }

    fn url(&self, endpoint: &str, params: &[(&str, String)]) -> String {
        let mut url = format!(
            "{}/{}.php?z={}&y={}",
            self.api_base,
            endpoint,
            urlencoding::encode(&self.username),
            urlencoding::encode(&self.api_key)
        );
        for (key, value) in params {
            url.push('&');
            url.push_str(key);
            url.push('=');
            url.push_str(&urlencoding::encode(value));
        }
        url
    }

    /// GET an endpoint and decode its JSON body. `Ok(None)` for 404/422,
    /// which the API uses for "nothing here" rather than a failure.
    async fn get_json(&self, endpoint: &str, params: &[(&str, String)]) -> ProviderResult<Option<Value>> {
        let url = self.url(endpoint, params);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| ProviderError::Transient(format!("{}: {}", endpoint, e.without_url())))?;

        let status = response.status();
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(ProviderError::AuthFailure(format!("{} returned {}", endpoint, status)));
            }
            StatusCode::NOT_FOUND | StatusCode::UNPROCESSABLE_ENTITY => return Ok(None),
            s if !s.is_success() => {
                return Err(ProviderError::Transient(format!("{} returned {}", endpoint, status)));
            }
            _ => {}
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| ProviderError::Malformed(format!("{}: {}", endpoint, e.without_url())))?;
        Ok(Some(body))
    }

    async fn get_required(&self, endpoint: &str, params: &[(&str, String)]) -> ProviderResult<Value> {
        self.get_json(endpoint, params)
            .await?
            .ok_or_else(|| ProviderError::Malformed(format!("{} returned no content", endpoint)))
    }
}

#[async_trait]
impl Provider for ApiClient {
    async fn fetch_current_game(&self) -> ProviderResult<Option<GameSummary>> {
        let body = self
            .get_required(
                API_USER_SUMMARY,
                &[("u", self.username.clone()), ("g", "1".into()), ("a", "0".into())],
            )
            .await?;
        map_current_game(&body, &self.media_base)
    }

    async fn fetch_progress(&self, game_id: GameId) -> ProviderResult<GameProgress> {
        let body = self
            .get_required(
                API_GAME_PROGRESS,
                &[("u", self.username.clone()), ("g", game_id.to_string())],
            )
            .await?;
        map_progress(&body, &self.media_base)
    }

    async fn fetch_recent_unlocks(&self, lookback_minutes: u32) -> ProviderResult<Vec<UnlockEvent>> {
        let body = self
            .get_required(
                API_RECENT_UNLOCKS,
                &[("u", self.username.clone()), ("m", lookback_minutes.to_string())],
            )
            .await?;
        map_recent_unlocks(&body, &self.media_base)
    }

    async fn fetch_leaderboards(&self, game_id: GameId) -> ProviderResult<Vec<LeaderboardSummary>> {
        match self
            .get_json(API_GAME_LEADERBOARDS, &[("i", game_id.to_string()), ("c", "500".into())])
            .await?
        {
            Some(body) => map_leaderboards(&body),
            None => Ok(Vec::new()),
        }
    }

    async fn fetch_leaderboard_entries(
        &self,
        leaderboard_id: LeaderboardId,
        top_n: u32,
    ) -> ProviderResult<LeaderboardPage> {
        match self
            .get_json(
                API_LEADERBOARD_ENTRIES,
                &[("i", leaderboard_id.to_string()), ("c", top_n.to_string())],
            )
            .await?
        {
            Some(body) => map_leaderboard_page(&body),
            None => Ok(LeaderboardPage::default()),
        }
    }

    async fn fetch_viewer_rank(
        &self,
        game_id: GameId,
        leaderboard_id: LeaderboardId,
    ) -> ProviderResult<Option<LeaderboardEntry>> {
        match self
            .get_json(
                API_USER_LEADERBOARDS,
                &[("i", game_id.to_string()), ("u", self.username.clone()), ("c", "500".into())],
            )
            .await?
        {
            Some(body) => map_viewer_rank(&body, leaderboard_id),
            None => Ok(None),
        }
    }
}

// ============================================================================
// Response mapping
// ============================================================================

fn list_items(body: &Value) -> Option<Vec<&Value>> {
    match body {
        Value::Array(items) => Some(items.iter().collect()),
        Value::Object(map) => Some(map.values().collect()),
        _ => None,
    }
}

fn results(body: &Value, endpoint: &str) -> ProviderResult<Vec<Value>> {
    let items = match body {
        Value::Array(items) => items.clone(),
        _ => field(body, &["Results", "results", "Entries"])
            .and_then(|v| v.as_array().cloned())
            .ok_or_else(|| ProviderError::Malformed(format!("{}: missing Results array", endpoint)))?,
    };
    Ok(items)
}

pub fn map_current_game(body: &Value, media_base: &str) -> ProviderResult<Option<GameSummary>> {
    if !body.is_object() {
        return Err(ProviderError::Malformed("user summary is not an object".into()));
    }
    let game = field(body, &["LastGame", "lastGame"]);
    let id = u64_field(body, &["LastGameID", "LastGameId", "lastGameId"])
        .or_else(|| game.and_then(|g| u64_field(g, &["ID", "Id"])))
        .unwrap_or(0);
    if id == 0 {
        return Ok(None);
    }

    let summary = match game {
        Some(g) => GameSummary {
            id,
            title: str_field(g, &["Title", "GameTitle"]).unwrap_or_default(),
            console_name: str_field(g, &["ConsoleName", "Console"]).unwrap_or_default(),
            box_art_url: str_field(g, &["ImageBoxArt", "BoxArt", "ImageIcon"])
                .and_then(|raw| media_url(media_base, &raw)),
        },
        None => GameSummary {
            id,
            title: String::new(),
            console_name: String::new(),
            box_art_url: None,
        },
    };
    Ok(Some(summary))
}

fn map_objective(raw: &Value, media_base: &str) -> Option<(i64, Objective)> {
    let id = u64_field(raw, &["ID", "AchievementID"])?;
    let earned_at = time_field(raw, &["DateEarnedHardcore"])
        .or_else(|| time_field(raw, &["DateEarned", "DateAwarded"]));
    let objective = Objective {
        id,
        title: str_field(raw, &["Title"]).unwrap_or_default(),
        description: str_field(raw, &["Description"]).unwrap_or_default(),
        points: u64_field(raw, &["Points"]).unwrap_or(0) as u32,
        badge_url: str_field(raw, &["BadgeURL", "BadgeName", "Badge"])
            .and_then(|b| media_url(media_base, &b)),
        earned_at,
    };
    let order = i64_field(raw, &["DisplayOrder"]).unwrap_or(0);
    Some((order, objective))
}

pub fn map_progress(body: &Value, media_base: &str) -> ProviderResult<GameProgress> {
    let achievements = field(body, &["Achievements"]);
    let items = match achievements {
        Some(v) => list_items(v)
            .ok_or_else(|| ProviderError::Malformed("Achievements is neither a map nor a list".into()))?,
        None if u64_field(body, &["ID"]).is_some() => Vec::new(),
        None => return Err(ProviderError::Malformed("game progress has no ID or Achievements".into())),
    };

    let mut objectives: Vec<(i64, Objective)> = items
        .into_iter()
        .filter_map(|raw| map_objective(raw, media_base))
        .collect();
    objectives.sort_by_key(|(order, o)| (*order, o.id));

    let (earned, remaining): (Vec<Objective>, Vec<Objective>) = objectives
        .into_iter()
        .map(|(_, o)| o)
        .partition(Objective::is_earned);

    let total = (earned.len() + remaining.len()) as u32;
    Ok(GameProgress {
        summary: ProgressSummary::new(earned.len() as u32, total),
        remaining,
        earned,
    })
}

pub fn map_recent_unlocks(body: &Value, media_base: &str) -> ProviderResult<Vec<UnlockEvent>> {
    let items = body
        .as_array()
        .ok_or_else(|| ProviderError::Malformed("recent unlocks is not a list".into()))?;

    Ok(items
        .iter()
        .filter_map(|raw| {
            Some(UnlockEvent {
                objective_id: u64_field(raw, &["AchievementID", "AchievementId", "ID"])?,
                game_id: u64_field(raw, &["GameID", "GameId"])?,
                title: str_field(raw, &["Title"]).unwrap_or_default(),
                description: str_field(raw, &["Description"]).unwrap_or_default(),
                points: u64_field(raw, &["Points"]).unwrap_or(0) as u32,
                badge_url: str_field(raw, &["BadgeURL", "BadgeName"])
                    .and_then(|b| media_url(media_base, &b)),
                occurred_at: time_field(raw, &["Date", "DateAwarded", "DateEarned"]),
            })
        })
        .collect())
}

pub fn map_leaderboards(body: &Value) -> ProviderResult<Vec<LeaderboardSummary>> {
    Ok(results(body, API_GAME_LEADERBOARDS)?
        .iter()
        .filter_map(|raw| {
            Some(LeaderboardSummary {
                id: u64_field(raw, &["ID", "LeaderboardID"])?,
                title: str_field(raw, &["Title"]).unwrap_or_default(),
                description: str_field(raw, &["Description"]).unwrap_or_default(),
                rank_ascending: bool_field(raw, &["RankAsc", "LowerIsBetter"]).unwrap_or(false),
                score_format: str_field(raw, &["Format"]).unwrap_or_default(),
            })
        })
        .collect())
}

fn map_entry(raw: &Value) -> Option<LeaderboardEntry> {
    Some(LeaderboardEntry {
        rank: u64_field(raw, &["Rank"])? as u32,
        user: str_field(raw, &["User", "Username"]).unwrap_or_default(),
        formatted_score: str_field(raw, &["FormattedScore"])
            .or_else(|| str_field(raw, &["Score"]))
            .unwrap_or_default(),
        raw_score: i64_field(raw, &["Score"]).unwrap_or(0),
    })
}

pub fn map_leaderboard_page(body: &Value) -> ProviderResult<LeaderboardPage> {
    let entries: Vec<LeaderboardEntry> = results(body, API_LEADERBOARD_ENTRIES)?
        .iter()
        .filter_map(map_entry)
        .collect();
    let total_entries = u64_field(body, &["Total", "NumEntries"])
        .map(|t| t as u32)
        .unwrap_or(entries.len() as u32);
    Ok(LeaderboardPage { entries, total_entries })
}

pub fn map_viewer_rank(body: &Value, leaderboard_id: LeaderboardId) -> ProviderResult<Option<LeaderboardEntry>> {
    Ok(results(body, API_USER_LEADERBOARDS)?
        .iter()
        .find(|raw| u64_field(raw, &["ID", "LeaderboardID"]) == Some(leaderboard_id))
        .and_then(|raw| field(raw, &["UserEntry"]))
        .and_then(map_entry))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    const MEDIA: &str = "https://media.example.org";

    #[test]
    fn current_game_from_user_summary() {
        let body = json!({
            "LastGameID": 1446,
            "LastGame": {
                "ID": 1446,
                "Title": "Sonic the Hedgehog",
                "ConsoleName": "Genesis/Mega Drive",
                "ImageBoxArt": "/Images/051872.png"
            }
        });
        let game = map_current_game(&body, MEDIA).unwrap().unwrap();
        assert_eq!(game.id, 1446);
        assert_eq!(game.console_name, "Genesis/Mega Drive");
        assert_eq!(game.box_art_url.as_deref(), Some("https://media.example.org/Images/051872.png"));
    }

    #[test]
    fn no_last_game_means_nothing_playing() {
        assert_eq!(map_current_game(&json!({"LastGameID": 0}), MEDIA).unwrap(), None);
        assert!(map_current_game(&json!([]), MEDIA).is_err());
    }

    #[test]
    fn progress_splits_and_orders_objectives() {
        let body = json!({
            "ID": 1446,
            "NumAchievements": 3,
            "Achievements": {
                "30": {"ID": 30, "Title": "C", "Points": 10, "BadgeName": "1001", "DisplayOrder": 2},
                "10": {"ID": 10, "Title": "A", "Points": "5", "BadgeName": "1002", "DisplayOrder": 1,
                        "DateEarned": "2024-03-09 18:00:00", "DateEarnedHardcore": "2024-03-09 18:04:05"},
                "20": {"id": 20, "title": "B", "points": 25, "DisplayOrder": 1}
            }
        });
        let progress = map_progress(&body, MEDIA).unwrap();
        assert_eq!(progress.summary, ProgressSummary::new(1, 3));
        let remaining: Vec<_> = progress.remaining.iter().map(|o| o.id).collect();
        assert_eq!(remaining, vec![20, 30]);
        assert_eq!(progress.earned[0].id, 10);
        assert_eq!(progress.earned[0].points, 5);
        assert_eq!(
            progress.earned[0].earned_at,
            Some(Utc.with_ymd_and_hms(2024, 3, 9, 18, 4, 5).unwrap())
        );
        assert_eq!(
            progress.remaining[1].badge_url.as_deref(),
            Some("https://media.example.org/Badge/1001.png")
        );
    }

    #[test]
    fn progress_accepts_list_and_empty_sets() {
        let body = json!({"ID": 5, "Achievements": [{"ID": 1, "Title": "Only"}]});
        assert_eq!(map_progress(&body, MEDIA).unwrap().remaining.len(), 1);

        let body = json!({"ID": 5, "Achievements": {}});
        assert_eq!(map_progress(&body, MEDIA).unwrap().summary.total, 0);

        assert!(matches!(
            map_progress(&json!({"Message": "nope"}), MEDIA),
            Err(ProviderError::Malformed(_))
        ));
    }

    #[test]
    fn recent_unlocks_skip_entries_without_ids() {
        let body = json!([
            {"Date": "2024-03-09 18:04:05", "AchievementID": 10, "GameID": 1446,
             "Title": "A", "Points": 5, "BadgeURL": "/Badge/1002.png"},
            {"Date": "2024-03-09 18:05:00", "Title": "no id"}
        ]);
        let unlocks = map_recent_unlocks(&body, MEDIA).unwrap();
        assert_eq!(unlocks.len(), 1);
        assert_eq!(unlocks[0].objective_id, 10);
        assert_eq!(unlocks[0].badge_url.as_deref(), Some("https://media.example.org/Badge/1002.png"));
        assert!(map_recent_unlocks(&json!({"oops": true}), MEDIA).is_err());
    }

    #[test]
    fn leaderboards_and_entries() {
        let body = json!({"Count": 1, "Total": 1, "Results": [
            {"ID": 7, "RankAsc": true, "Title": "Fastest", "Description": "Any%", "Format": "TIME"}
        ]});
        let boards = map_leaderboards(&body).unwrap();
        assert_eq!(boards[0].id, 7);
        assert!(boards[0].rank_ascending);

        let body = json!({"Count": 2, "Total": 57, "Results": [
            {"User": "alpha", "Rank": 1, "Score": 3120, "FormattedScore": "0:52.00"},
            {"User": "beta", "Rank": 2, "Score": 3300, "FormattedScore": "0:55.00"}
        ]});
        let page = map_leaderboard_page(&body).unwrap();
        assert_eq!(page.total_entries, 57);
        assert_eq!(page.entries[1].user, "beta");
        assert_eq!(page.entries[1].raw_score, 3300);
    }

    #[test]
    fn viewer_rank_matches_leaderboard_id() {
        let body = json!({"Results": [
            {"ID": 7, "UserEntry": {"User": "me", "Rank": 12, "Score": 4000, "FormattedScore": "1:06.66"}},
            {"ID": 8, "UserEntry": {"User": "me", "Rank": 3, "Score": 10, "FormattedScore": "10"}}
        ]});
        let entry = map_viewer_rank(&body, 8).unwrap().unwrap();
        assert_eq!(entry.rank, 3);
        assert_eq!(map_viewer_rank(&body, 9).unwrap(), None);
    }
}
