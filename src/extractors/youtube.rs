use url::Url;

use super::VideoId;

/// Path prefixes on youtube.com whose next segment is the video identifier
const ID_PATH_PREFIXES: &[&str] = &["embed", "v", "shorts", "live"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum YoutubeHost {
    /// youtu.be short links
    Short,
    /// youtube.com and youtube-nocookie.com, any subdomain
    Site,
}

fn classify_host(host: &str) -> Option<YoutubeHost> {
    let host = host.to_ascii_lowercase();
    let is_domain = |domain: &str| host == domain || host.ends_with(&format!(".{}", domain));

    if is_domain("youtu.be") {
        Some(YoutubeHost::Short)
    } else if is_domain("youtube.com") || is_domain("youtube-nocookie.com") {
        Some(YoutubeHost::Site)
    } else {
        None
    }
}

/// Check if the URL points at YouTube at all
pub fn is_youtube_url(url: &Url) -> bool {
    url.host_str().and_then(classify_host).is_some()
}

/// Find the video identifier in a parsed YouTube URL
pub fn video_id_from_url(url: &Url) -> Option<VideoId> {
    let host = classify_host(url.host_str()?)?;
    let mut segments = url.path_segments()?.filter(|s| !s.is_empty());

    match host {
        YoutubeHost::Short => segments.next().and_then(VideoId::parse),
        YoutubeHost::Site => {
            let first = segments.next();
            match first {
                Some("watch") | None => url
                    .query_pairs()
                    .find(|(key, _)| key == "v")
                    .and_then(|(_, value)| VideoId::parse(&value)),
                Some(prefix) if ID_PATH_PREFIXES.contains(&prefix) => {
                    segments.next().and_then(VideoId::parse)
                }
                Some(_) => None,
            }
        }
    }
}
