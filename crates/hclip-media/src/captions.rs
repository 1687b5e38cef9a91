//! SRT subtitle sidecars for compilations.

use hclip_models::timestamp::format_srt_timestamp;
use hclip_models::CompilationEntry;

/// Build an SRT document from the transcripts of `entries`.
///
/// Line offsets are clip-relative; each clip is shifted by the summed duration
/// of the clips before it. A cue lasts until the next line of the same clip, or
/// until the clip ends.
pub fn build_srt(entries: &[CompilationEntry]) -> String {
    let mut srt = String::new();
    let mut cue = 1;
    let mut clip_start = 0.0;

    for entry in entries {
        let mut lines: Vec<_> = entry
            .transcript
            .iter()
            .filter(|l| !l.text.trim().is_empty())
            .collect();
        lines.sort_by(|a, b| a.offset_secs.total_cmp(&b.offset_secs));

        for (i, line) in lines.iter().enumerate() {
            let start = line.offset_secs.clamp(0.0, entry.duration_secs);
            let end = lines
                .get(i + 1)
                .map(|next| next.offset_secs)
                .unwrap_or(entry.duration_secs)
                .clamp(start, entry.duration_secs);

            srt.push_str(&format!(
                "{}\n{} --> {}\n{}\n\n",
                cue,
                format_srt_timestamp(clip_start + start),
                format_srt_timestamp(clip_start + end),
                line.text.trim()
            ));
            cue += 1;
        }

        clip_start += entry.duration_secs;
    }

    srt
}

#[cfg(test)]
mod tests {
    use super::*;
    use hclip_models::{ClipId, TranscriptLine};
    use std::path::PathBuf;

    fn entry(name: &str, duration_secs: f64, lines: &[(f64, &str)]) -> CompilationEntry {
        CompilationEntry {
            clip_id: ClipId::from(name),
            path: PathBuf::from(name),
            description: String::new(),
            peak_offset_secs: 0.0,
            duration_secs,
            transcript: lines
                .iter()
                .map(|(offset_secs, text)| TranscriptLine {
                    offset_secs: *offset_secs,
                    text: text.to_string(),
                })
                .collect(),
        }
    }

    #[test]
    fn test_offsets_shift_by_preceding_clips() {
        let srt = build_srt(&[
            entry("a.mp4", 6.0, &[(0.5, "no way"), (3.0, "NO WAY")]),
            entry("b.mp4", 6.0, &[(1.25, "clip it")]),
        ]);

        let expected = "1\n00:00:00,500 --> 00:00:03,000\nno way\n\n\
                        2\n00:00:03,000 --> 00:00:06,000\nNO WAY\n\n\
                        3\n00:00:07,250 --> 00:00:12,000\nclip it\n\n";
        assert_eq!(srt, expected);
    }

    #[test]
    fn test_clips_without_transcript_still_advance_time() {
        let srt = build_srt(&[
            entry("a.mp4", 5.0, &[]),
            entry("b.mp4", 6.0, &[(0.0, "  hello  "), (2.0, " ")]),
        ]);
        assert_eq!(srt, "1\n00:00:05,000 --> 00:00:11,000\nhello\n\n");
    }

    #[test]
    fn test_empty_run() {
        assert!(build_srt(&[]).is_empty());
    }
}
