//! iCalendar (RFC 5545) export and "add to Google Calendar" links for events.

use chrono::{DateTime, Duration, Utc};

use crate::database::models::{Publication, PublicationKind};

const PRODID: &str = "-//Courtyard//Community Portal//EN";
const GOOGLE_CALENDAR_URL: &str = "https://calendar.google.com/calendar/render";
/// Content octets per physical line; continuation lines spend one on the leading space.
const MAX_LINE_OCTETS: usize = 75;

#[derive(Debug, Clone, PartialEq)]
pub struct CalendarEvent {
    pub uid: String,
    pub title: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub url: Option<String>,
    pub start: DateTime<Utc>,
    pub end: Option<DateTime<Utc>>,
}

impl CalendarEvent {
    /// End of the event, one hour after the start when not given.
    pub fn effective_end(&self) -> DateTime<Utc> {
        self.end
            .filter(|end| *end >= self.start)
            .unwrap_or(self.start + Duration::hours(1))
    }

    /// Calendar view of a published event; `None` for other kinds or undated events.
    pub fn from_publication(publication: &Publication, host: &str, base_url: &str) -> Option<Self> {
        if publication.kind != PublicationKind::Event {
            return None;
        }
        let start = publication.event_start?;
        Some(Self {
            uid: format!("publication-{}@{}", publication.id, host),
            title: publication.title.clone(),
            description: Some(publication.excerpt.clone()).filter(|d| !d.is_empty()),
            location: publication.event_location.clone(),
            url: Some(publication.public_url(base_url)),
            start,
            end: publication.event_end,
        })
    }
}

pub fn format_utc(at: DateTime<Utc>) -> String {
    at.format("%Y%m%dT%H%M%SZ").to_string()
}

/// Escapes a TEXT property value.
pub fn escape_text(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '\\' => out.push_str("\\\\"),
            ';' => out.push_str("\\;"),
            ',' => out.push_str("\\,"),
            '\n' => out.push_str("\\n"),
            '\r' => {
                if chars.peek() != Some(&'\n') {
                    out.push_str("\\n");
                }
            }
            _ => out.push(ch),
        }
    }
    out
}

/// Folds a content line at 75 octets without splitting UTF-8 sequences. Every physical
/// line, including the last, ends with CRLF.
pub fn fold_line(line: &str) -> String {
    let mut out = String::with_capacity(line.len() + 8);
    let mut used = 0;
    let mut budget = MAX_LINE_OCTETS;

    for ch in line.chars() {
        let len = ch.len_utf8();
        if used + len > budget {
            out.push_str("\r\n ");
            used = 0;
            budget = MAX_LINE_OCTETS - 1;
        }
        out.push(ch);
        used += len;
    }
    out.push_str("\r\n");
    out
}

pub fn event_to_ics(event: &CalendarEvent, now: DateTime<Utc>) -> String {
    let mut lines = vec![
        "BEGIN:VCALENDAR".to_string(),
        "VERSION:2.0".to_string(),
        format!("PRODID:{PRODID}"),
        "CALSCALE:GREGORIAN".to_string(),
        "METHOD:PUBLISH".to_string(),
        "BEGIN:VEVENT".to_string(),
        format!("UID:{}", event.uid),
        format!("DTSTAMP:{}", format_utc(now)),
        format!("DTSTART:{}", format_utc(event.start)),
        format!("DTEND:{}", format_utc(event.effective_end())),
        format!("SUMMARY:{}", escape_text(&event.title)),
    ];
    if let Some(description) = &event.description {
        lines.push(format!("DESCRIPTION:{}", escape_text(description)));
    }
    if let Some(location) = &event.location {
        lines.push(format!("LOCATION:{}", escape_text(location)));
    }
    if let Some(url) = &event.url {
        lines.push(format!("URL:{url}"));
    }
    lines.push("END:VEVENT".to_string());
    lines.push("END:VCALENDAR".to_string());

    lines.iter().map(|line| fold_line(line)).collect()
}

pub fn google_calendar_link(event: &CalendarEvent) -> String {
    let dates = format!(
        "{}/{}",
        format_utc(event.start),
        format_utc(event.effective_end())
    );
    let mut query = url::form_urlencoded::Serializer::new(String::new());
    query
        .append_pair("action", "TEMPLATE")
        .append_pair("text", &event.title)
        .append_pair("dates", &dates);
    if let Some(description) = &event.description {
        query.append_pair("details", description);
    }
    if let Some(location) = &event.location {
        query.append_pair("location", location);
    }
    format!("{GOOGLE_CALENDAR_URL}?{}", query.finish())
}

/// File name for the `.ics` attachment, limited to slug-safe characters.
pub fn ics_file_name(slug: &str) -> String {
    let safe: String = slug
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-')
        .collect();
    if safe.is_empty() {
        "event.ics".to_string()
    } else {
        format!("{safe}.ics")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn event() -> CalendarEvent {
        CalendarEvent {
            uid: "publication-7@dom.example.org".into(),
            title: "Subbotnik; yard, playground".into(),
            description: Some("Bring gloves\nand rakes".into()),
            location: Some("Courtyard, building 2".into()),
            url: Some("https://dom.example.org/events/subbotnik".into()),
            start: Utc.with_ymd_and_hms(2026, 5, 16, 7, 0, 0).unwrap(),
            end: None,
        }
    }

    #[test]
    fn renders_vevent() {
        let now = Utc.with_ymd_and_hms(2026, 5, 1, 12, 0, 0).unwrap();
        let ics = event_to_ics(&event(), now);
        assert!(ics.starts_with("BEGIN:VCALENDAR\r\nVERSION:2.0\r\n"));
        assert!(ics.ends_with("END:VEVENT\r\nEND:VCALENDAR\r\n"));
        assert!(ics.contains("DTSTAMP:20260501T120000Z\r\n"));
        assert!(ics.contains("DTSTART:20260516T070000Z\r\n"));
        assert!(ics.contains("DTEND:20260516T080000Z\r\n"));
        assert!(ics.contains("SUMMARY:Subbotnik\\; yard\\, playground\r\n"));
        assert!(ics.contains("DESCRIPTION:Bring gloves\\nand rakes\r\n"));
        assert!(ics.contains("LOCATION:Courtyard\\, building 2\r\n"));
    }

    #[test]
    fn escapes_backslash_and_crlf() {
        assert_eq!(escape_text("a\\b\r\nc\rd"), "a\\\\b\\nc\\nd");
    }

    #[test]
    fn folds_long_lines_on_char_boundaries() {
        let line = format!("SUMMARY:{}", "Ж".repeat(60));
        let folded = fold_line(&line);
        let physical: Vec<&str> = folded.trim_end_matches("\r\n").split("\r\n").collect();
        assert!(physical.len() > 1);
        assert!(physical.iter().all(|l| l.len() <= MAX_LINE_OCTETS));
        assert!(physical[1..].iter().all(|l| l.starts_with(' ')));
        let unfolded: String = folded
            .trim_end_matches("\r\n")
            .replace("\r\n ", "");
        assert_eq!(unfolded, line);
    }

    #[test]
    fn short_lines_are_untouched() {
        assert_eq!(fold_line("VERSION:2.0"), "VERSION:2.0\r\n");
    }

    #[test]
    fn end_before_start_falls_back_to_an_hour() {
        let mut ev = event();
        ev.end = Some(ev.start - Duration::hours(2));
        assert_eq!(ev.effective_end(), ev.start + Duration::hours(1));
    }

    #[test]
    fn google_link_is_encoded() {
        let link = google_calendar_link(&event());
        assert!(link.starts_with("https://calendar.google.com/calendar/render?action=TEMPLATE"));
        assert!(link.contains("text=Subbotnik%3B+yard%2C+playground"));
        assert!(link.contains("dates=20260516T070000Z%2F20260516T080000Z"));
        assert!(link.contains("location=Courtyard%2C+building+2"));
    }

    #[test]
    fn attachment_name_is_sanitised() {
        assert_eq!(ics_file_name("spring-fair"), "spring-fair.ics");
        assert_eq!(ics_file_name("../\"x"), "x.ics");
        assert_eq!(ics_file_name("\""), "event.ics");
    }
}
