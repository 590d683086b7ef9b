//! ACRCloud response shapes and their mapping onto [`SongResult`].
//!
//! Only the fields the client reads are modelled; everything else in the
//! response is ignored.  Every field is optional so a sparse candidate still
//! deserialises.

use serde::{Deserialize, Serialize};

use super::error::RecognitionError;

pub const UNKNOWN_ARTIST: &str = "Unknown Artist";

const SPOTIFY_TRACK_URL: &str = "https://open.spotify.com/track/";
const SPOTIFY_ISRC_SEARCH_URL: &str = "https://open.spotify.com/search/isrc:";

// ---------------------------------------------------------------------------
// SongResult
// ---------------------------------------------------------------------------

/// Normalised recognition outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SongResult {
    pub title: String,
    pub artist: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub album: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub album_art: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub release_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_url: Option<String>,
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct AcrResponse {
    pub status: AcrStatus,
    #[serde(default)]
    pub metadata: Option<AcrMetadata>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AcrStatus {
    pub code: i64,
    #[serde(default)]
    pub msg: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AcrMetadata {
    #[serde(default)]
    pub music: Vec<AcrMusic>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AcrMusic {
    pub title: Option<String>,
    #[serde(default)]
    pub artists: Vec<AcrArtist>,
    pub album: Option<AcrAlbum>,
    pub release_date: Option<String>,
    pub external_metadata: Option<ExternalMetadata>,
    pub external_ids: Option<ExternalIds>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AcrArtist {
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AcrAlbum {
    pub name: Option<String>,
    pub cover: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExternalMetadata {
    pub spotify: Option<SpotifyMetadata>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SpotifyMetadata {
    pub track: Option<SpotifyTrack>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpotifyTrack {
    pub id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExternalIds {
    pub isrc: Option<String>,
}

// ---------------------------------------------------------------------------
// Mapping
// ---------------------------------------------------------------------------

fn non_empty(value: Option<&String>) -> Option<String> {
    value.map(|s| s.trim()).filter(|s| !s.is_empty()).map(str::to_string)
}

impl AcrMusic {
    fn spotify_track_id(&self) -> Option<String> {
        let track = self.external_metadata.as_ref()?.spotify.as_ref()?.track.as_ref()?;
        non_empty(track.id.as_ref())
    }

    fn isrc(&self) -> Option<String> {
        non_empty(self.external_ids.as_ref()?.isrc.as_ref())
    }

    /// Track link first, ISRC search second, nothing otherwise.
    pub fn external_url(&self) -> Option<String> {
        if let Some(id) = self.spotify_track_id() {
            return Some(format!("{SPOTIFY_TRACK_URL}{id}"));
        }
        self.isrc().map(|isrc| format!("{SPOTIFY_ISRC_SEARCH_URL}{isrc}"))
    }

    /// `None` when the candidate has no title.
    pub fn to_song(&self) -> Option<SongResult> {
        let title = non_empty(self.title.as_ref())?;
        let artist = self
            .artists
            .first()
            .and_then(|a| non_empty(a.name.as_ref()))
            .unwrap_or_else(|| UNKNOWN_ARTIST.to_string());

        Some(SongResult {
            title,
            artist,
            album: self.album.as_ref().and_then(|a| non_empty(a.name.as_ref())),
            album_art: self.album.as_ref().and_then(|a| non_empty(a.cover.as_ref())),
            release_date: non_empty(self.release_date.as_ref()),
            external_url: self.external_url(),
        })
    }
}

/// User-facing guidance for documented ACRCloud status codes.
pub fn upstream_guidance(code: i64) -> Option<&'static str> {
    match code {
        1001 => Some("Song not recognized. Try recording a different part of the song."),
        2004 => Some("No music detected. Play the song louder or move closer to the microphone."),
        3001 => Some("Invalid access key. Check the recognition credentials."),
        3003 => Some("Recognition quota exceeded. Try again later."),
        3014 => Some("Invalid request signature. Check the access secret and the system clock."),
        3015 => Some("Too many requests. Wait a moment and try again."),
        _ => None,
    }
}

/// Map a parsed response onto a song or a typed error.
pub fn interpret(response: &AcrResponse) -> Result<SongResult, RecognitionError> {
    let code = response.status.code;
    if code != 0 {
        let message = upstream_guidance(code)
            .map(str::to_string)
            .or_else(|| non_empty(response.status.msg.as_ref()))
            .unwrap_or_else(|| format!("Recognition failed (code {code})."));
        return Err(RecognitionError::UpstreamRejected { code, message });
    }

    response
        .metadata
        .as_ref()
        .and_then(|m| m.music.first())
        .and_then(AcrMusic::to_song)
        .ok_or(RecognitionError::NotFound)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(value: serde_json::Value) -> AcrResponse {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn full_candidate_maps_every_field() {
        let resp = parse(json!({
            "status": {"code": 0, "msg": "Success"},
            "metadata": {"music": [{
                "title": "Bohemian Rhapsody",
                "artists": [{"name": "Queen"}, {"name": "Someone Else"}],
                "album": {"name": "A Night at the Opera", "cover": "https://img/cover.jpg"},
                "release_date": "1975-10-31",
                "external_metadata": {"spotify": {"track": {"id": "7tFiyTwD0nx5a1eklYtX2J"}}},
                "external_ids": {"isrc": "GBUM71029604"}
            }]}
        }));

        let song = interpret(&resp).unwrap();
        assert_eq!(song.title, "Bohemian Rhapsody");
        assert_eq!(song.artist, "Queen");
        assert_eq!(song.album.as_deref(), Some("A Night at the Opera"));
        assert_eq!(song.album_art.as_deref(), Some("https://img/cover.jpg"));
        assert_eq!(song.release_date.as_deref(), Some("1975-10-31"));
        assert_eq!(
            song.external_url.as_deref(),
            Some("https://open.spotify.com/track/7tFiyTwD0nx5a1eklYtX2J")
        );
    }

    #[test]
    fn isrc_link_when_no_track_id() {
        let resp = parse(json!({
            "status": {"code": 0},
            "metadata": {"music": [{
                "title": "Song",
                "external_metadata": {"spotify": {}},
                "external_ids": {"isrc": "USRC17607839"}
            }]}
        }));
        let song = interpret(&resp).unwrap();
        assert_eq!(
            song.external_url.as_deref(),
            Some("https://open.spotify.com/search/isrc:USRC17607839")
        );
        assert_eq!(song.artist, UNKNOWN_ARTIST);
    }

    #[test]
    fn no_link_without_identifiers() {
        let resp = parse(json!({
            "status": {"code": 0},
            "metadata": {"music": [{"title": "Song", "artists": []}]}
        }));
        let song = interpret(&resp).unwrap();
        assert_eq!(song.external_url, None);
        assert_eq!(song.album, None);
    }

    #[test]
    fn empty_music_is_not_found() {
        let resp = parse(json!({"status": {"code": 0}, "metadata": {"music": []}}));
        assert_eq!(interpret(&resp), Err(RecognitionError::NotFound));

        let resp = parse(json!({"status": {"code": 0}}));
        assert_eq!(interpret(&resp), Err(RecognitionError::NotFound));
    }

    #[test]
    fn untitled_candidate_is_not_found() {
        let resp = parse(json!({"status": {"code": 0}, "metadata": {"music": [{"title": " "}]}}));
        assert_eq!(interpret(&resp), Err(RecognitionError::NotFound));
    }

    #[test]
    fn known_codes_get_guidance() {
        let err = interpret(&parse(json!({"status": {"code": 2004, "msg": "Can't generate fingerprint"}})))
            .unwrap_err();
        match err {
            RecognitionError::UpstreamRejected { code, message } => {
                assert_eq!(code, 2004);
                assert!(message.contains("No music detected"), "{message}");
            }
            other => panic!("unexpected {other:?}"),
        }

        let err = interpret(&parse(json!({"status": {"code": 1001, "msg": "No result"}}))).unwrap_err();
        assert!(err.to_string().contains("different part"));
    }

    #[test]
    fn unknown_code_passes_upstream_message_through() {
        let err = interpret(&parse(json!({"status": {"code": 9999, "msg": "Strange failure"}})))
            .unwrap_err();
        assert_eq!(
            err,
            RecognitionError::UpstreamRejected {
                code: 9999,
                message: "Strange failure".into()
            }
        );

        let err = interpret(&parse(json!({"status": {"code": 9998}}))).unwrap_err();
        assert!(err.to_string().contains("9998"));
    }

    #[test]
    fn song_serialises_camel_case() {
        let song = SongResult {
            title: "T".into(),
            artist: "A".into(),
            album: None,
            album_art: Some("art".into()),
            release_date: Some("2000".into()),
            external_url: None,
        };
        let v = serde_json::to_value(&song).unwrap();
        assert_eq!(v["albumArt"], "art");
        assert_eq!(v["releaseDate"], "2000");
        assert!(v.get("album").is_none());
        assert!(v.get("externalUrl").is_none());
    }
}
