use serde::{Deserialize, Serialize};

use crate::event::{Event, EventKind, Score};

/// Largest delta time a MIDI variable-length quantity can hold.
const MAX_VLQ: u64 = 0x0FFF_FFFF;

/// Options for rendering a melody to MIDI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderOptions {
    /// Quarter notes per minute. Default: 120.
    pub tempo_bpm: f64,
    /// Pulses per quarter note. Default: 480.
    pub ticks_per_quarter: u16,
    /// Note-on velocity. Default: 80.
    pub velocity: u8,
    /// General MIDI program. Default: 0 (acoustic grand).
    pub program: u8,
    pub channel: u8,
    /// Written as the melody track name when set.
    pub track_name: Option<String>,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            tempo_bpm: 120.0,
            ticks_per_quarter: 480,
            velocity: 80,
            program: 0,
            channel: 0,
            track_name: None,
        }
    }
}

/// Write a monophonic event sequence to Standard MIDI File format 1 bytes.
///
/// Track 0: tempo. Track 1: the melody, one note at a time, rests as gaps.
pub fn events_to_midi(events: &[Event], options: &RenderOptions) -> Vec<u8> {
    let tracks = [
        build_tempo_track(options.tempo_bpm),
        build_melody_track(events, options),
    ];
    assemble_smf(options.ticks_per_quarter, &tracks)
}

/// Like [`events_to_midi`], naming the track after the score's title.
pub fn score_to_midi(score: &Score, options: &RenderOptions) -> Vec<u8> {
    let mut options = options.clone();
    if options.track_name.is_none() {
        options.track_name.clone_from(&score.title);
    }
    events_to_midi(&score.events, &options)
}

fn microseconds_per_beat(bpm: f64) -> u32 {
    if !(bpm > 0.0) || !bpm.is_finite() {
        return 500_000; // 120 BPM
    }
    // Tempo meta events carry 24 bits.
    (60_000_000.0 / bpm).round().clamp(1.0, 16_777_215.0) as u32
}

fn build_tempo_track(bpm: f64) -> Vec<u8> {
    let usec = microseconds_per_beat(bpm);
    let mut track_data = Vec::new();

    write_vlq(&mut track_data, 0);
    track_data.extend_from_slice(&[
        0xFF,
        0x51,
        0x03,
        (usec >> 16) as u8,
        (usec >> 8) as u8,
        usec as u8,
    ]);

    // 4/4
    write_vlq(&mut track_data, 0);
    track_data.extend_from_slice(&[0xFF, 0x58, 0x04, 4, 2, 0x18, 0x08]);

    end_track(&mut track_data, 0);
    track_data
}

fn build_melody_track(events: &[Event], options: &RenderOptions) -> Vec<u8> {
    let channel = options.channel & 0x0F;
    let ppq = f64::from(options.ticks_per_quarter);
    let mut track_data = Vec::new();

    if let Some(name) = &options.track_name {
        let name_bytes = name.as_bytes();
        write_vlq(&mut track_data, 0);
        track_data.extend_from_slice(&[0xFF, 0x03]);
        write_vlq(&mut track_data, name_bytes.len() as u64);
        track_data.extend_from_slice(name_bytes);
    }

    write_vlq(&mut track_data, 0);
    track_data.extend_from_slice(&[0xC0 | channel, options.program & 0x7F]);

    // Ticks come from the running offset in quarters so rounding never
    // accumulates across a long melody.
    let mut offset = 0.0;
    let mut last_tick = 0u64;

    for event in events {
        let onset = (offset * ppq).round() as u64;
        offset += event.duration;
        let release = (offset * ppq).round() as u64;

        if let EventKind::Note { pitch } = event.kind {
            let pitch = pitch & 0x7F;
            write_vlq(&mut track_data, onset.saturating_sub(last_tick));
            track_data.extend_from_slice(&[0x90 | channel, pitch, options.velocity & 0x7F]);
            write_vlq(&mut track_data, release.saturating_sub(onset));
            track_data.extend_from_slice(&[0x80 | channel, pitch, 0]);
            last_tick = release;
        }
    }

    // A trailing rest still counts toward the track length.
    let end = (offset * ppq).round() as u64;
    end_track(&mut track_data, end.saturating_sub(last_tick));
    track_data
}

fn end_track(track_data: &mut Vec<u8>, delta: u64) {
    write_vlq(track_data, delta);
    track_data.extend_from_slice(&[0xFF, 0x2F, 0x00]);
}

/// Header chunk plus one `MTrk` chunk per track, format 1.
fn assemble_smf(ppq: u16, tracks: &[Vec<u8>]) -> Vec<u8> {
    const FORMAT: u16 = 1;

    let header: Vec<u8> = [FORMAT, tracks.len() as u16, ppq]
        .iter()
        .flat_map(|word| word.to_be_bytes())
        .collect();

    let size = 14 + tracks.iter().map(|track| track.len() + 8).sum::<usize>();
    let mut smf = Vec::with_capacity(size);
    write_chunk(&mut smf, b"MThd", &header);
    for track in tracks {
        write_chunk(&mut smf, b"MTrk", track);
    }
    smf
}

fn write_chunk(smf: &mut Vec<u8>, tag: &[u8; 4], body: &[u8]) {
    smf.extend_from_slice(tag);
    smf.extend_from_slice(&(body.len() as u32).to_be_bytes());
    smf.extend_from_slice(body);
}

/// Write a variable-length quantity, saturating at the format's maximum.
fn write_vlq(buf: &mut Vec<u8>, value: u64) {
    let mut value = value.min(MAX_VLQ) as u32;
    let mut bytes = [0u8; 4];
    let mut len = 0;
    loop {
        bytes[len] = (value & 0x7F) as u8 | if len > 0 { 0x80 } else { 0 };
        len += 1;
        value >>= 7;
        if value == 0 {
            break;
        }
    }
    buf.extend(bytes[..len].iter().rev());
}
