//! Argument and filter-graph construction for every encode job of a run.
//!
//! Everything here is pure: the same inputs always produce the same argument list,
//! which keeps runs reproducible and lets the graphs be asserted on directly.

use crate::{
    batch::{Batch, image_name},
    config::OutputGeometry,
    format::format_seconds,
    timeline::Timeline,
};

pub const RESIZED_LABEL: &str = "resized";
pub const CONCAT_AUDIO_LABEL: &str = "concatAudio";

/// A fully specified encoder invocation.
#[derive(Clone, Debug, PartialEq)]
pub struct EncodeJob {
    pub label: String,
    pub args: Vec<String>,
    pub inputs: Vec<String>,
    pub output: String,
    /// Duration of the output, when it is known before the job runs.
    pub expected_duration: Option<f64>,
}

impl EncodeJob {
    /// The `-filter_complex` text, if the job has one.
    pub fn filter_graph(&self) -> Option<&str> {
        self.args
            .iter()
            .position(|a| a == "-filter_complex")
            .and_then(|i| self.args.get(i + 1))
            .map(String::as_str)
    }
}

fn push_all(args: &mut Vec<String>, items: &[&str]) {
    args.extend(items.iter().map(|s| s.to_string()));
}

/// Center-crop to the output aspect on full height, then scale to the output size.
pub fn normalize_background_filter(input: &str, geometry: OutputGeometry) -> String {
    let (num, den) = geometry.aspect();
    format!(
        "[{input}]crop=in_h*{num}/{den}:in_h[cropped];[cropped]scale={w}:{h}[{RESIZED_LABEL}]",
        w = geometry.width,
        h = geometry.height,
    )
}

/// Join audio inputs `1..=n` in order into one stream.
pub fn audio_concat_filter(n: usize) -> String {
    let mut filter = String::with_capacity(n * 6 + 40);
    for i in 1..=n {
        filter.push_str(&format!("[{i}:a]"));
    }
    filter.push_str(&format!("concat=n={n}:v=0:a=1[{CONCAT_AUDIO_LABEL}]"));
    filter
}

/// Normalize the background without narration; the output keeps its natural duration.
pub fn background_only_job(
    background: &str,
    output: &str,
    geometry: OutputGeometry,
    preset: &str,
) -> EncodeJob {
    let graph = normalize_background_filter("0:v", geometry);
    let mut args = Vec::with_capacity(9);
    push_all(
        &mut args,
        &[
            "-i",
            background,
            "-filter_complex",
            graph.as_str(),
            "-map",
            format!("[{RESIZED_LABEL}]").as_str(),
            "-preset",
            preset,
            output,
        ],
    );

    EncodeJob {
        label: "normalize background".to_string(),
        args,
        inputs: vec![background.to_string()],
        output: output.to_string(),
        expected_duration: None,
    }
}

/// Loop the background under the concatenated narration, bounded to `total_duration`.
///
/// Falls back to [`background_only_job`] when there is nothing to narrate.
pub fn audio_over_loop_job(
    background: &str,
    audio: &[String],
    total_duration: f64,
    output: &str,
    geometry: OutputGeometry,
    preset: &str,
) -> EncodeJob {
    if audio.is_empty() || total_duration <= 0.0 {
        return background_only_job(background, output, geometry, preset);
    }

    let graph = format!(
        "{};{}",
        normalize_background_filter("0:v", geometry),
        audio_concat_filter(audio.len())
    );

    let mut args = Vec::with_capacity(4 + 2 * audio.len() + 11);
    push_all(&mut args, &["-stream_loop", "-1", "-i", background]);
    for name in audio {
        push_all(&mut args, &["-i", name.as_str()]);
    }
    push_all(
        &mut args,
        &[
            "-filter_complex",
            graph.as_str(),
            "-map",
            format!("[{RESIZED_LABEL}]").as_str(),
            "-map",
            format!("[{CONCAT_AUDIO_LABEL}]").as_str(),
            "-preset",
            preset,
            "-t",
            format_seconds(total_duration).as_str(),
            output,
        ],
    );

    let mut inputs = Vec::with_capacity(audio.len() + 1);
    inputs.push(background.to_string());
    inputs.extend(audio.iter().cloned());

    EncodeJob {
        label: "stitching audio".to_string(),
        args,
        inputs,
        output: output.to_string(),
        expected_duration: Some(total_duration),
    }
}

/// Chained overlays, image `i` visible only during its own narration.
pub fn overlay_filter(batch: &Batch, timeline: &Timeline) -> String {
    let mut stages = Vec::with_capacity(batch.count);
    for i in 0..batch.count {
        let (from, to) = batch.local_gate(timeline, i);
        let base = if i == 0 {
            "0:v".to_string()
        } else {
            format!("v{i}")
        };
        stages.push(format!(
            "[{base}][{input}:v]overlay=x=(main_w-overlay_w)/2:y=(main_h-overlay_h)/2:enable='between(t,{from},{to})'[v{out}]",
            input = i + 1,
            from = format_seconds(from),
            to = format_seconds(to),
            out = i + 1,
        ));
    }
    stages.join(";")
}

/// Overlay one batch's images onto its slice of the narrated background.
pub fn overlay_job(batch: &Batch, timeline: &Timeline, input: &str, preset: &str) -> EncodeJob {
    let (start, end) = batch.window(timeline);
    let graph = overlay_filter(batch, timeline);
    let images: Vec<String> = (batch.start..batch.end()).map(image_name).collect();
    let output = batch.output_name();

    let mut args = Vec::with_capacity(6 + 2 * images.len() + 9);
    push_all(
        &mut args,
        &[
            "-ss",
            format_seconds(start).as_str(),
            "-to",
            format_seconds(end).as_str(),
            "-i",
            input,
        ],
    );
    for name in &images {
        push_all(&mut args, &["-i", name.as_str()]);
    }
    push_all(
        &mut args,
        &[
            "-filter_complex",
            graph.as_str(),
            "-map",
            format!("[v{}]", batch.count).as_str(),
            "-map",
            "0:a",
            "-preset",
            preset,
            output.as_str(),
        ],
    );

    let mut inputs = Vec::with_capacity(images.len() + 1);
    inputs.push(input.to_string());
    inputs.extend(images);

    EncodeJob {
        label: format!("overlay batch {}", batch.index),
        args,
        inputs,
        output,
        expected_duration: Some(end - start),
    }
}

/// Concat demuxer list file, one `file <name>` line per clip.
pub fn concat_list(clips: &[String]) -> String {
    clips
        .iter()
        .map(|name| format!("file {name}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Join already-encoded clips listed in `list` without re-encoding.
pub fn concat_job(list: &str, clips: &[String], output: &str, total: f64) -> EncodeJob {
    let mut args = Vec::with_capacity(9);
    push_all(
        &mut args,
        &["-f", "concat", "-safe", "0", "-i", list, "-c", "copy", output],
    );

    let mut inputs = Vec::with_capacity(clips.len() + 1);
    inputs.push(list.to_string());
    inputs.extend(clips.iter().cloned());

    EncodeJob {
        label: "stitching clips".to_string(),
        args,
        inputs,
        output: output.to_string(),
        expected_duration: Some(total),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::schedule_batches;

    fn strs(args: &[String]) -> Vec<&str> {
        args.iter().map(String::as_str).collect()
    }

    #[test]
    fn normalize_crops_to_nine_sixteen() {
        assert_eq!(
            normalize_background_filter("0:v", OutputGeometry::default()),
            "[0:v]crop=in_h*9/16:in_h[cropped];[cropped]scale=720:1280[resized]"
        );
    }

    #[test]
    fn audio_concat_lists_inputs_in_order() {
        assert_eq!(
            audio_concat_filter(3),
            "[1:a][2:a][3:a]concat=n=3:v=0:a=1[concatAudio]"
        );
    }

    #[test]
    fn audio_job_loops_background_and_bounds_duration() {
        let audio = vec!["audio_0.wav".to_string(), "audio_1.wav".to_string()];
        let job = audio_over_loop_job(
            "background.mp4",
            &audio,
            8.0,
            "narrated.mp4",
            OutputGeometry::default(),
            "ultrafast",
        );

        assert_eq!(
            strs(&job.args),
            vec![
                "-stream_loop",
                "-1",
                "-i",
                "background.mp4",
                "-i",
                "audio_0.wav",
                "-i",
                "audio_1.wav",
                "-filter_complex",
                "[0:v]crop=in_h*9/16:in_h[cropped];[cropped]scale=720:1280[resized];[1:a][2:a]concat=n=2:v=0:a=1[concatAudio]",
                "-map",
                "[resized]",
                "-map",
                "[concatAudio]",
                "-preset",
                "ultrafast",
                "-t",
                "8",
                "narrated.mp4",
            ]
        );
        assert_eq!(job.inputs.len(), 3);
        assert_eq!(job.expected_duration, Some(8.0));
    }

    #[test]
    fn audio_job_without_narration_is_plain_normalize() {
        let job = audio_over_loop_job(
            "background.mp4",
            &[],
            0.0,
            "narrated.mp4",
            OutputGeometry::default(),
            "ultrafast",
        );
        assert!(!job.args.iter().any(|a| a == "-stream_loop" || a == "-t"));
        assert_eq!(job.expected_duration, None);
        assert_eq!(job.args.last().map(String::as_str), Some("narrated.mp4"));
    }

    #[test]
    fn overlay_chain_gates_each_image() {
        let timeline = Timeline::from_durations(&[5.0, 3.0, 8.0]);
        let batch = schedule_batches(3, 10)[0];

        assert_eq!(
            overlay_filter(&batch, &timeline),
            "[0:v][1:v]overlay=x=(main_w-overlay_w)/2:y=(main_h-overlay_h)/2:enable='between(t,0,5)'[v1];\
             [v1][2:v]overlay=x=(main_w-overlay_w)/2:y=(main_h-overlay_h)/2:enable='between(t,5,8)'[v2];\
             [v2][3:v]overlay=x=(main_w-overlay_w)/2:y=(main_h-overlay_h)/2:enable='between(t,8,16)'[v3]"
        );
    }

    #[test]
    fn single_entry_batch_has_one_stage() {
        let timeline = Timeline::from_durations(&[2.0; 11]);
        let last = schedule_batches(11, 10)[1];

        let graph = overlay_filter(&last, &timeline);
        assert!(!graph.contains(';'));
        assert_eq!(
            graph,
            "[0:v][1:v]overlay=x=(main_w-overlay_w)/2:y=(main_h-overlay_h)/2:enable='between(t,0,2)'[v1]"
        );

        let job = overlay_job(&last, &timeline, "narrated.mp4", "ultrafast");
        assert_eq!(
            strs(&job.args[..8]),
            vec!["-ss", "20", "-to", "22", "-i", "narrated.mp4", "-i", "img_10.png"]
        );
        assert!(job.args.windows(2).any(|w| w[0] == "-map" && w[1] == "[v1]"));
        assert!(job.args.windows(2).any(|w| w[0] == "-map" && w[1] == "0:a"));
        assert_eq!(job.output, "out_1.mp4");
    }

    #[test]
    fn zero_duration_segment_gets_empty_gate() {
        let timeline = Timeline::from_durations(&[1.5, 0.0, 2.0]);
        let batch = schedule_batches(3, 10)[0];
        let graph = overlay_filter(&batch, &timeline);
        assert!(graph.contains("between(t,1.5,1.5)"));
        assert!(graph.ends_with("[v3]"));
    }

    #[test]
    fn overlay_job_is_deterministic() {
        let timeline = Timeline::from_durations(&[1.25, 2.5, 0.75, 4.0]);
        let batch = schedule_batches(4, 10)[0];
        let a = overlay_job(&batch, &timeline, "narrated.mp4", "ultrafast");
        let b = overlay_job(&batch, &timeline, "narrated.mp4", "ultrafast");
        assert_eq!(a, b);
        assert_eq!(a.filter_graph(), b.filter_graph());
    }

    #[test]
    fn concat_list_preserves_order() {
        let clips: Vec<String> = schedule_batches(23, 10)
            .iter()
            .map(Batch::output_name)
            .collect();
        assert_eq!(
            concat_list(&clips),
            "file out_0.mp4\nfile out_1.mp4\nfile out_2.mp4"
        );

        let job = concat_job("concat_list.txt", &clips, "final.mp4", 46.0);
        assert_eq!(
            strs(&job.args),
            vec![
                "-f",
                "concat",
                "-safe",
                "0",
                "-i",
                "concat_list.txt",
                "-c",
                "copy",
                "final.mp4"
            ]
        );
        assert_eq!(job.filter_graph(), None);
    }
}
