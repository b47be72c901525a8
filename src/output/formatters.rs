use crate::timestamp;
use crate::transcript::TranscriptDocument;

/// Format transcript as a WebVTT subtitle track with voice tags
pub fn format_as_vtt(doc: &TranscriptDocument) -> String {
    let mut vtt = String::from("WEBVTT\n\n");

    for (index, entry) in doc.entries.iter().enumerate() {
        let start = timestamp::normalize(&entry.start_offset);
        let end = timestamp::normalize(&entry.end_offset);

        vtt.push_str(&format!("{}\n", entry.cue_id(index + 1)));
        vtt.push_str(&format!("{} --> {}\n", start, end));
        vtt.push_str(&format!("<v {}>{}\n\n", entry.speaker(), entry.text()));
    }

    vtt
}

/// Format transcript as plain text, one paragraph per run of the same speaker
pub fn format_as_grouped(doc: &TranscriptDocument) -> String {
    let mut grouped = Vec::new();
    let mut current_speaker: Option<&str> = None;
    let mut buffer = String::new();

    for entry in &doc.entries {
        let speaker = entry.speaker();

        if current_speaker != Some(speaker) {
            if let Some(previous) = current_speaker {
                flush(&mut grouped, previous, &buffer);
            }
            current_speaker = Some(speaker);
            buffer = entry.text().to_string();
        } else {
            buffer.push(' ');
            buffer.push_str(entry.text());
        }
    }

    if let Some(speaker) = current_speaker {
        flush(&mut grouped, speaker, &buffer);
    }

    grouped.join("\n\n")
}

// Runs with no text at all are dropped rather than emitted as "Speaker: ".
fn flush(grouped: &mut Vec<String>, speaker: &str, buffer: &str) {
    if !buffer.is_empty() {
        grouped.push(format!("{}: {}", speaker, buffer.trim()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcript::{EntryId, TranscriptEntry};

    fn entry(speaker: Option<&str>, text: &str, start: &str, end: &str) -> TranscriptEntry {
        TranscriptEntry {
            id: None,
            start_offset: start.to_string(),
            end_offset: end.to_string(),
            speaker_display_name: speaker.map(str::to_string),
            text: Some(text.to_string()),
        }
    }

    fn doc(entries: Vec<TranscriptEntry>) -> TranscriptDocument {
        TranscriptDocument { entries }
    }

    #[test]
    fn test_grouped_merges_consecutive_speakers() {
        let d = doc(vec![
            entry(Some("A"), "hi", "0:00:00", "0:00:01"),
            entry(Some("A"), "there", "0:00:01", "0:00:02"),
            entry(Some("B"), "yo", "0:00:02", "0:00:03"),
        ]);
        assert_eq!(format_as_grouped(&d), "A: hi there\n\nB: yo");
    }

    #[test]
    fn test_grouped_does_not_merge_non_adjacent_runs() {
        let d = doc(vec![
            entry(Some("A"), "one", "0:00:00", "0:00:01"),
            entry(Some("B"), "two", "0:00:01", "0:00:02"),
            entry(Some("A"), " three ", "0:00:02", "0:00:03"),
        ]);
        assert_eq!(format_as_grouped(&d), "A: one\n\nB: two\n\nA: three");
    }

    #[test]
    fn test_grouped_unknown_is_its_own_speaker() {
        let d = doc(vec![
            entry(None, "who", "0:00:00", "0:00:01"),
            entry(Some("Unknown"), "me", "0:00:01", "0:00:02"),
            entry(Some("C"), "ok", "0:00:02", "0:00:03"),
        ]);
        assert_eq!(format_as_grouped(&d), "Unknown: who me\n\nC: ok");
    }

    #[test]
    fn test_grouped_empty() {
        assert_eq!(format_as_grouped(&doc(vec![])), "");
    }

    #[test]
    fn test_vtt_empty_is_header_only() {
        assert_eq!(format_as_vtt(&doc(vec![])), "WEBVTT\n\n");
    }

    #[test]
    fn test_vtt_cues() {
        let mut first = entry(Some("Ada"), "Hello", "00:00:01.2340000", "00:00:02.5000000");
        first.id = Some(EntryId::Text("7".to_string()));
        let d = doc(vec![first, entry(None, "Bye", "0:01:00", "0:01:01.25")]);

        let expected = "WEBVTT\n\n\
            7\n00:00:01.234 --> 00:00:02.500\n<v Ada>Hello\n\n\
            2\n00:01:00.000 --> 00:01:01.250\n<v Unknown>Bye\n\n";
        assert_eq!(format_as_vtt(&d), expected);
    }

    #[test]
    fn test_vtt_one_cue_per_entry_in_order() {
        let d = doc(vec![
            entry(Some("A"), "a", "0:00:00", "0:00:01"),
            entry(Some("A"), "b", "0:00:01", "0:00:02"),
            entry(Some("B"), "c", "0:00:02", "0:00:03"),
        ]);
        let vtt = format_as_vtt(&d);
        assert_eq!(vtt.matches(" --> ").count(), 3);
        let a = vtt.find(">a\n").unwrap();
        let b = vtt.find(">b\n").unwrap();
        let c = vtt.find(">c\n").unwrap();
        assert!(a < b && b < c);
    }
}
