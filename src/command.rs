use url::Url;

use crate::api::records::POST_COLLECTION;

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Profile(String),
    Search(String),
    Open(String),
    Chat(String),
    Post(String),
    Timeline,
    Notifications,
    Messages,
    Login,
    Logout,
    Crt,
    Sound,
    Help,
    Quit,
}

pub fn parse_command(input: &str) -> Option<Command> {
    let input = input.strip_prefix(':').unwrap_or(input).trim();

    if input.is_empty() {
        return None;
    }

    let (cmd, args) = match input.split_once(char::is_whitespace) {
        Some((cmd, args)) => (cmd, args.trim()),
        None => (input, ""),
    };

    match cmd {
        "profile" | "user" if !args.is_empty() => {
            Some(Command::Profile(strip_at(args).to_owned()))
        }
        "search" if !args.is_empty() => Some(Command::Search(args.to_owned())),
        "open" if !args.is_empty() => Some(Command::Open(args.to_owned())),
        "chat" | "dm" if !args.is_empty() => Some(Command::Chat(args.to_owned())),
        "post" if !args.is_empty() => Some(Command::Post(args.to_owned())),
        "timeline" | "home" => Some(Command::Timeline),
        "notifications" | "n" => Some(Command::Notifications),
        "messages" | "dm" => Some(Command::Messages),
        "login" => Some(Command::Login),
        "logout" => Some(Command::Logout),
        "crt" => Some(Command::Crt),
        "sound" => Some(Command::Sound),
        "help" | "h" => Some(Command::Help),
        "quit" | "q" => Some(Command::Quit),
        _ => None,
    }
}

/// Accept an `at://` post URI or a `bsky.app` post URL and return the URI.
pub fn parse_post_uri(input: &str) -> Option<String> {
    let trimmed = input.trim();

    if let Some(rest) = trimmed.strip_prefix("at://") {
        let mut parts = rest.split('/');
        let (Some(repo), Some(collection), Some(rkey)) = (parts.next(), parts.next(), parts.next())
        else {
            return None;
        };
        if repo.is_empty() || collection != POST_COLLECTION || rkey.is_empty() {
            return None;
        }
        return Some(trimmed.to_owned());
    }

    let url = Url::parse(trimmed).ok()?;

    let host = url.host_str()?;
    if host != "bsky.app" && host != "www.bsky.app" {
        return None;
    }

    // Path: /profile/<handle-or-did>/post/<rkey>
    let segments: Vec<&str> = url.path_segments()?.collect();

    if segments.len() >= 4 && segments[0] == "profile" && segments[2] == "post" {
        let (actor, rkey) = (segments[1], segments[3]);
        if !actor.is_empty() && !rkey.is_empty() {
            return Some(format!("at://{actor}/{POST_COLLECTION}/{rkey}"));
        }
    }

    None
}

pub fn strip_at(handle: &str) -> &str {
    handle.strip_prefix('@').unwrap_or(handle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_command_profile() {
        assert_eq!(
            parse_command(":profile @alice.bsky.social"),
            Some(Command::Profile("alice.bsky.social".into()))
        );
        assert_eq!(
            parse_command("user bob.test"),
            Some(Command::Profile("bob.test".into()))
        );
    }

    #[test]
    fn test_parse_command_with_args() {
        assert_eq!(
            parse_command(":search rust lang"),
            Some(Command::Search("rust lang".into()))
        );
        assert_eq!(
            parse_command(":post  hello   world "),
            Some(Command::Post("hello   world".into()))
        );
        assert_eq!(
            parse_command(":dm did:plc:bob"),
            Some(Command::Chat("did:plc:bob".into()))
        );
    }

    #[test]
    fn test_parse_command_aliases() {
        assert_eq!(parse_command(":q"), Some(Command::Quit));
        assert_eq!(parse_command(":h"), Some(Command::Help));
        assert_eq!(parse_command(":n"), Some(Command::Notifications));
        assert_eq!(parse_command(":dm"), Some(Command::Messages));
        assert_eq!(parse_command(":home"), Some(Command::Timeline));
        assert_eq!(parse_command(":crt"), Some(Command::Crt));
    }

    #[test]
    fn test_parse_command_missing_args() {
        assert_eq!(parse_command(""), None);
        assert_eq!(parse_command(":"), None);
        assert_eq!(parse_command(":profile"), None);
        assert_eq!(parse_command(":post"), None);
    }

    #[test]
    fn test_parse_post_uri_web_url() {
        assert_eq!(
            parse_post_uri("https://bsky.app/profile/bob.test/post/3kabc"),
            Some("at://bob.test/app.bsky.feed.post/3kabc".into())
        );
    }

    #[test]
    fn test_parse_post_uri_at_uri() {
        assert_eq!(
            parse_post_uri("at://did:plc:bob/app.bsky.feed.post/3kabc"),
            Some("at://did:plc:bob/app.bsky.feed.post/3kabc".into())
        );
    }

    #[test]
    fn test_parse_post_uri_invalid() {
        assert_eq!(parse_post_uri("at://did:plc:bob/app.bsky.feed.like/3k"), None);
        assert_eq!(parse_post_uri("https://example.com/profile/a/post/1"), None);
        assert_eq!(parse_post_uri("https://bsky.app/profile/bob.test"), None);
        assert_eq!(parse_post_uri("not a url at all"), None);
    }

    #[test]
    fn test_strip_at() {
        assert_eq!(strip_at("@alice"), "alice");
        assert_eq!(strip_at("bob"), "bob");
    }
}
