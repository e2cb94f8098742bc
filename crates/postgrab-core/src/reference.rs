//! Post link parsing.
//!
//! Accepted shapes (scheme optional, `t.me` or `telegram.me`):
//! - `t.me/c/<channel>/<item>` and `t.me/c/<channel>/<thread>/<item>`
//! - `t.me/<username>/<item>` and `t.me/<username>/<thread>/<item>`
//!
//! Query strings and fragments are ignored.

use url::Url;

use crate::{
    domain::{ContainerRef, ItemId, PostReference},
    errors::Error,
    Result,
};

const HOSTS: &[&str] = &["t.me", "telegram.me"];

/// Path segments that are never usernames.
const RESERVED: &[&str] = &["c", "m", "s", "joinchat", "addstickers", "share"];

fn parse_url(raw: &str) -> Result<Url> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(Error::MalformedReference("empty link".to_string()));
    }
    let with_scheme = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    };

    let url = Url::parse(&with_scheme)
        .map_err(|e| Error::MalformedReference(format!("{trimmed}: {e}")))?;

    let host = url.host_str().unwrap_or("").trim_start_matches("www.");
    if !HOSTS.contains(&host) {
        return Err(Error::MalformedReference(format!(
            "{trimmed}: not a t.me link"
        )));
    }
    Ok(url)
}

fn segments(url: &Url) -> Vec<String> {
    url.path_segments()
        .map(|s| s.filter(|p| !p.is_empty()).map(str::to_string).collect())
        .unwrap_or_default()
}

fn parse_item(raw: &str, link: &str) -> Result<ItemId> {
    match raw.parse::<i32>() {
        Ok(n) if n >= 1 => Ok(ItemId(n)),
        _ => Err(Error::MalformedReference(format!(
            "{link}: post id must be a positive number, got {raw:?}"
        ))),
    }
}

fn parse_channel(raw: &str, link: &str) -> Result<ContainerRef> {
    match raw.parse::<i64>() {
        Ok(n) if n >= 1 => ContainerRef::private_channel(n).ok_or_else(|| {
            Error::MalformedReference(format!("{link}: channel id {raw} is out of range"))
        }),
        _ => Err(Error::MalformedReference(format!(
            "{link}: channel id must be numeric, got {raw:?}"
        ))),
    }
}

fn parse_username(raw: &str, link: &str) -> Result<ContainerRef> {
    let valid = !raw.is_empty()
        && !RESERVED.contains(&raw)
        && raw
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '_');
    if !valid {
        return Err(Error::MalformedReference(format!(
            "{link}: invalid username {raw:?}"
        )));
    }
    Ok(ContainerRef::Name(raw.to_string()))
}

/// Parse a post link into a [`PostReference`].
pub fn parse_reference(raw: &str) -> Result<PostReference> {
    let url = parse_url(raw)?;
    let link = raw.trim();
    let segs = segments(&url);
    let parts: Vec<&str> = segs.iter().map(String::as_str).collect();

    let (container, thread, item) = match parts.as_slice() {
        ["c", channel, item] => (parse_channel(channel, link)?, None, item),
        ["c", channel, thread, item] => (
            parse_channel(channel, link)?,
            Some(parse_item(thread, link)?),
            item,
        ),
        [name, item] => (parse_username(name, link)?, None, item),
        [name, thread, item] => (
            parse_username(name, link)?,
            Some(parse_item(thread, link)?),
            item,
        ),
        _ => {
            return Err(Error::MalformedReference(format!(
                "{link}: expected a link like https://t.me/<chat>/<post id>"
            )))
        }
    };

    Ok(PostReference {
        container,
        item: parse_item(item, link)?,
        thread,
    })
}

/// Parse the two ends of a range. Both links must name the same container.
pub fn parse_range_links(start: &str, end: &str) -> Result<(ContainerRef, ItemId, ItemId)> {
    let start = parse_reference(start)?;
    let end = parse_reference(end)?;
    if start.container != end.container {
        return Err(Error::ContainerMismatch);
    }
    Ok((start.container, start.item, end.item))
}

/// Parse a container given as a link (`https://t.me/name`, `t.me/c/<n>`), a bare
/// username, or a numeric chat id.
pub fn parse_container_token(raw: &str) -> Result<ContainerRef> {
    let token = raw.trim().trim_end_matches('/');
    if token.is_empty() {
        return Err(Error::MalformedReference("empty container".to_string()));
    }

    if let Ok(id) = token.parse::<i64>() {
        return Ok(ContainerRef::Id(id));
    }

    let looks_like_link = token.contains('/') || HOSTS.iter().any(|h| token.starts_with(h));
    if !looks_like_link {
        return parse_username(token.trim_start_matches('@'), raw);
    }

    let url = parse_url(token)?;
    let segs = segments(&url);
    let parts: Vec<&str> = segs.iter().map(String::as_str).collect();
    match parts.as_slice() {
        ["c", channel, ..] => parse_channel(channel, raw),
        [name, ..] => parse_username(name, raw),
        [] => Err(Error::MalformedReference(format!(
            "{raw}: link does not name a chat"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn named(name: &str, item: i32) -> PostReference {
        PostReference::new(ContainerRef::Name(name.to_string()), ItemId(item))
    }

    #[test]
    fn parses_public_links() {
        assert_eq!(
            parse_reference("https://t.me/itsSmartDev/547").unwrap(),
            named("itsSmartDev", 547)
        );
        assert_eq!(parse_reference("t.me/chan/1").unwrap(), named("chan", 1));
    }

    #[test]
    fn parses_private_channel_links() {
        let r = parse_reference("https://t.me/c/1234567890/55").unwrap();
        assert_eq!(r.container, ContainerRef::Id(-1001234567890));
        assert_eq!(r.item, ItemId(55));
        assert_eq!(r.thread, None);
    }

    #[test]
    fn parses_thread_links() {
        let r = parse_reference("https://t.me/c/12345/67890/2").unwrap();
        assert_eq!(r.thread, Some(ItemId(67890)));
        assert_eq!(r.item, ItemId(2));

        let r = parse_reference("https://t.me/chan/10/11").unwrap();
        assert_eq!(r.container, ContainerRef::Name("chan".into()));
        assert_eq!(r.thread, Some(ItemId(10)));
        assert_eq!(r.item, ItemId(11));
    }

    #[test]
    fn query_fragment_is_ignored() {
        for link in [
            "https://t.me/chan/100",
            "https://t.me/c/777/100",
            "https://t.me/chan/5/100",
        ] {
            let plain = parse_reference(link).unwrap();
            assert_eq!(parse_reference(&format!("{link}?x=1")).unwrap(), plain);
            assert_eq!(parse_reference(&format!("{link}?single")).unwrap(), plain);
            assert_eq!(parse_reference(&format!("{link}#frag")).unwrap(), plain);
        }
    }

    #[test]
    fn rejects_malformed_links() {
        for bad in [
            "",
            "hello",
            "https://example.com/chan/1",
            "https://t.me/chan",
            "https://t.me/chan/abc",
            "https://t.me/chan/0",
            "https://t.me/chan/-4",
            "https://t.me/c/abc/4",
            "https://t.me/m/4",
            "https://t.me/a/b/c/d/e",
            "https://t.me/c/9223372036854775807/1",
            "https://t.me/c/9223372036854775807/5/1",
            "https://t.me/c/99999999999999999999/1",
        ] {
            let err = parse_reference(bad).unwrap_err();
            assert!(
                matches!(err, Error::MalformedReference(_)),
                "{bad:?} gave {err:?}"
            );
        }
    }

    #[test]
    fn range_links_must_share_container() {
        let (c, s, e) =
            parse_range_links("https://t.me/chan/100", "https://t.me/chan/120").unwrap();
        assert_eq!(c, ContainerRef::Name("chan".into()));
        assert_eq!((s, e), (ItemId(100), ItemId(120)));

        let err = parse_range_links("https://t.me/a/1", "https://t.me/b/2").unwrap_err();
        assert!(matches!(err, Error::ContainerMismatch));
    }

    #[test]
    fn container_tokens() {
        assert_eq!(
            parse_container_token("https://t.me/mychannel/").unwrap(),
            ContainerRef::Name("mychannel".into())
        );
        assert_eq!(
            parse_container_token("mychannel").unwrap(),
            ContainerRef::Name("mychannel".into())
        );
        assert_eq!(
            parse_container_token("@mychannel").unwrap(),
            ContainerRef::Name("mychannel".into())
        );
        assert_eq!(
            parse_container_token("-1001234").unwrap(),
            ContainerRef::Id(-1001234)
        );
        assert_eq!(
            parse_container_token("https://t.me/c/1234567890").unwrap(),
            ContainerRef::Id(-1001234567890)
        );
        assert!(parse_container_token("https://t.me/").is_err());
        assert!(parse_container_token("bad name").is_err());
        assert!(matches!(
            parse_container_token("https://t.me/c/9223372036854775807"),
            Err(Error::MalformedReference(_))
        ));
    }
}
