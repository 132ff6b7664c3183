//! End-to-end tests exercising the tape through its public facade.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use approx::assert_abs_diff_eq;
use spool::{
    export_track_wav, DirStorage, Error, MemStorage, Result, Tape, TapeSlice, TapeStorage,
    CAPACITY,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt::try_init();
}

fn wait_until(mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(1));
    }
    false
}

/// Storage whose reads can be held shut, to pin the streamer mid-refill.
struct GateStorage {
    inner: MemStorage,
    open: Arc<AtomicBool>,
}

impl TapeStorage for GateStorage {
    fn read_span(&mut self, track: usize, span: TapeSlice, out: &mut [f32]) -> Result<usize> {
        while !self.open.load(Ordering::Relaxed) {
            thread::sleep(Duration::from_millis(1));
        }
        self.inner.read_span(track, span, out)
    }

    fn write_span(&mut self, track: usize, span: TapeSlice, data: &[f32]) -> Result<usize> {
        self.inner.write_span(track, span, data)
    }
}

#[test]
fn test_adjacent_takes_merge_then_cut_then_glue() {
    init_tracing();
    let tape = Tape::new(MemStorage::new()).unwrap();
    let mut take = TapeSlice::none();
    tape.go_to(100);
    tape.write_fw(0, &[0.2; 100], &mut take).unwrap();
    tape.go_to(200);
    tape.write_fw(0, &[0.4; 100], &mut take).unwrap();

    // Touching takes merged into one slice.
    assert_eq!(take, TapeSlice::new(0, 200));
    assert_eq!(tape.slices(0).unwrap(), vec![TapeSlice::new(0, 200)]);

    tape.go_to(100);
    tape.cut(0).unwrap();
    assert_eq!(
        tape.slices(0).unwrap(),
        vec![TapeSlice::new(0, 100), TapeSlice::new(100, 200)]
    );
    assert_eq!(tape.current_slice(0).unwrap(), Some(TapeSlice::new(100, 200)));

    // The lock-free view catches up within a streamer pass.
    assert!(wait_until(|| tape.slices_view(0).unwrap().len() == 2));

    tape.glue(0, TapeSlice::new(0, 100), TapeSlice::new(100, 200))
        .unwrap();
    assert_eq!(tape.slices(0).unwrap(), vec![TapeSlice::new(0, 200)]);
}

#[test]
fn test_jump_reads_count_underrun_until_refill_lands() {
    init_tracing();
    let open = Arc::new(AtomicBool::new(true));
    let tape = Tape::new(GateStorage {
        inner: MemStorage::new(),
        open: Arc::clone(&open),
    })
    .unwrap();

    let far: i64 = 1_000_000;
    let data: Vec<f32> = (0..100).map(|i| i as f32 * 0.01).collect();
    let mut take = TapeSlice::none();
    tape.go_to(far + 100);
    tape.write_fw(0, &data, &mut take).unwrap();
    assert_eq!(take, TapeSlice::new(far, far + 100));
    assert!(wait_until(|| tape.metrics().bytes_written >= 400));

    tape.go_to(0);
    // Hold the refill: the jump back finds an empty window and reads must
    // pad silence while counting every missing frame.
    open.store(false, Ordering::Relaxed);
    tape.go_to(far);
    let mut out = [7.0f32; 100];
    let underrun = tape.read_fw(0, &mut out).unwrap();
    assert_eq!(underrun, 100);
    assert_eq!(out, [0.0; 100]);
    assert_eq!(tape.metrics().underrun_frames, 100);

    // Once the refill lands the same region plays for real.
    open.store(true, Ordering::Relaxed);
    tape.go_to(far);
    assert!(tape.wait_for_fill(100, Duration::from_secs(5)));
    let underrun = tape.read_fw(0, &mut out).unwrap();
    assert_eq!(underrun, 0);
    assert_eq!(out[..], data[..]);
}

#[test]
fn test_oversized_read_returns_window_then_counted_silence() {
    init_tracing();
    let tape = Tape::new(MemStorage::new()).unwrap();
    tape.go_to(0);
    // Blank tape still fills as valid silence, up to the whole window.
    assert!(tape.wait_for_fill(CAPACITY, Duration::from_secs(10)));

    let mut out = vec![1.0f32; CAPACITY + 100];
    let underrun = tape.read_fw(0, &mut out).unwrap();
    assert_eq!(underrun, 100);
    assert!(out.iter().all(|s| *s == 0.0));
    assert_eq!(tape.position(), (CAPACITY + 100) as i64);
    assert_eq!(tape.metrics().underrun_frames, 100);
}

#[test]
fn test_lift_and_drop_splice_across_tracks() {
    init_tracing();
    let tape = Tape::new(MemStorage::new()).unwrap();
    let data: Vec<f32> = (0..100).map(|i| i as f32 * 0.01).collect();
    let mut take = TapeSlice::none();
    tape.go_to(100);
    tape.write_fw(0, &data, &mut take).unwrap();

    tape.go_to(50);
    let lifted = tape.lift(0).unwrap();
    assert_eq!(lifted, Some(TapeSlice::new(0, 100)));
    assert!(tape.slices(0).unwrap().is_empty());
    assert!(!tape.clipboard_is_empty());

    // The lifted region now plays as silence.
    tape.go_to(0);
    let mut out = [9.0f32; 100];
    tape.read_fw(0, &mut out).unwrap();
    assert_eq!(out, [0.0; 100]);

    // Drop onto a different track at a new position.
    tape.go_to(300);
    let placed = tape.drop(1).unwrap();
    assert_eq!(placed, 100);
    assert!(tape.clipboard_is_empty());
    assert_eq!(tape.slices(1).unwrap(), vec![TapeSlice::new(300, 400)]);

    let mut out = [0.0f32; 100];
    let underrun = tape.read_fw(1, &mut out).unwrap();
    assert_eq!(underrun, 0);
    assert_eq!(out[..], data[..]);
}

#[test]
fn test_lift_supersedes_previous_clipboard() {
    init_tracing();
    let tape = Tape::new(MemStorage::new()).unwrap();
    let mut take = TapeSlice::none();
    tape.go_to(10);
    tape.write_fw(0, &[0.1; 10], &mut take).unwrap();
    let mut take = TapeSlice::none();
    tape.go_to(60);
    tape.write_fw(1, &[0.9; 10], &mut take).unwrap();

    tape.go_to(5);
    assert_eq!(tape.lift(0).unwrap(), Some(TapeSlice::new(0, 10)));
    tape.go_to(55);
    assert_eq!(tape.lift(1).unwrap(), Some(TapeSlice::new(50, 60)));

    // Only the second lift is claimable.
    tape.go_to(200);
    assert_eq!(tape.drop(2).unwrap(), 10);
    let mut out = [0.0f32; 10];
    tape.read_fw(2, &mut out).unwrap();
    assert_eq!(out, [0.9; 10]);
    assert_eq!(tape.drop(3).unwrap(), 0);
}

#[test]
fn test_recorded_audio_survives_window_eviction() {
    init_tracing();
    let tape = Tape::new(MemStorage::new()).unwrap();
    let data: Vec<f32> = (0..1000).map(|i| ((i * 7) % 13) as f32 / 13.0).collect();
    let mut take = TapeSlice::none();
    tape.go_to(1000);
    tape.write_fw(2, &data, &mut take).unwrap();
    assert!(wait_until(|| tape.metrics().bytes_written >= 4000));

    // Jump far enough that the window reuses every slot, then come back.
    tape.go_to(10 * CAPACITY as i64);
    assert!(tape.wait_for_fill(1024, Duration::from_secs(5)));

    tape.go_to(0);
    assert!(tape.wait_for_fill(1000, Duration::from_secs(5)));
    let mut out = vec![0.0f32; 1000];
    let underrun = tape.read_fw(2, &mut out).unwrap();
    assert_eq!(underrun, 0);
    assert_eq!(out, data);
}

#[test]
fn test_backward_play_returns_reversed_content() {
    init_tracing();
    let tape = Tape::new(MemStorage::new()).unwrap();
    let data: Vec<f32> = (0..200).map(|i| (i as f32 / 20.0).cos()).collect();
    let mut take = TapeSlice::none();
    tape.go_to(200);
    tape.write_fw(3, &data, &mut take).unwrap();

    let mut out = vec![0.0f32; 200];
    let underrun = tape.read_bw(3, &mut out).unwrap();
    assert_eq!(underrun, 0);
    let reversed: Vec<f32> = data.iter().rev().copied().collect();
    assert_eq!(out, reversed);
    assert_eq!(tape.position(), 0);
}

#[test]
fn test_concurrent_reader_never_sees_torn_slices() {
    init_tracing();
    let tape = Arc::new(Tape::new(MemStorage::new()).unwrap());
    let mut take = TapeSlice::none();
    tape.go_to(10_000);
    tape.write_fw(0, &vec![0.1; 10_000], &mut take).unwrap();

    let stop = Arc::new(AtomicBool::new(false));
    let reader = thread::spawn({
        let tape = Arc::clone(&tape);
        let stop = Arc::clone(&stop);
        move || {
            while !stop.load(Ordering::Relaxed) {
                let view = tape.slices_view(0).unwrap();
                for pair in view.windows(2) {
                    assert!(pair[0].end <= pair[1].start, "view has overlapping slices");
                }
                let mut out = [0.0f32; 64];
                let _ = tape.read_fw(0, &mut out);
            }
        }
    });

    for i in 0..50i64 {
        tape.go_to(1_000 + i * 37);
        tape.cut(0).unwrap();
    }
    loop {
        let slices = tape.slices(0).unwrap();
        if slices.len() < 2 {
            break;
        }
        tape.glue(0, slices[0], slices[1]).unwrap();
    }
    stop.store(true, Ordering::Relaxed);
    reader.join().unwrap();

    assert_eq!(tape.slices(0).unwrap(), vec![TapeSlice::new(0, 10_000)]);
}

#[test]
fn test_storage_failure_keeps_tape_serving() {
    init_tracing();
    struct FailingStorage;
    impl TapeStorage for FailingStorage {
        fn read_span(&mut self, _: usize, _: TapeSlice, out: &mut [f32]) -> Result<usize> {
            out.fill(0.0);
            Err(Error::Storage("injected".into()))
        }
        fn write_span(&mut self, _: usize, _: TapeSlice, _: &[f32]) -> Result<usize> {
            Err(Error::Storage("injected".into()))
        }
    }

    let tape = Tape::new(FailingStorage).unwrap();
    let mut take = TapeSlice::none();
    tape.go_to(100);
    tape.write_fw(0, &[0.5; 100], &mut take).unwrap();
    assert!(wait_until(|| tape.metrics().storage_errors >= 1));

    // The window is still intact and serving.
    tape.go_to(0);
    let mut out = [0.0f32; 100];
    let underrun = tape.read_fw(0, &mut out).unwrap();
    assert_eq!(underrun, 0);
    assert_eq!(out, [0.5; 100]);
}

#[test]
fn test_persisted_track_exports_to_wav() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let data: Vec<f32> = (0..400).map(|i| (i as f32 / 50.0).sin() * 0.8).collect();
    {
        let tape = Tape::new(DirStorage::open(dir.path()).unwrap()).unwrap();
        let mut take = TapeSlice::none();
        tape.go_to(400);
        tape.write_fw(0, &data, &mut take).unwrap();
        assert_eq!(take, TapeSlice::new(0, 400));
        // Dropping the tape flushes and joins the streamer.
    }

    let mut storage = DirStorage::open(dir.path()).unwrap();
    let mut back = vec![0.0f32; 400];
    storage
        .read_span(0, TapeSlice::new(0, 400), &mut back)
        .unwrap();
    assert_eq!(back, data);

    let wav_path = dir.path().join("track0.wav");
    export_track_wav(&mut storage, &[TapeSlice::new(0, 400)], 0, &wav_path, 44100.0).unwrap();
    let mut reader = hound::WavReader::open(&wav_path).unwrap();
    let samples: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
    assert_eq!(samples.len(), 400);
    for (sample, original) in samples.iter().zip(&data) {
        assert_abs_diff_eq!(
            *sample as f32 / i16::MAX as f32,
            *original,
            epsilon = 1e-3
        );
    }
}
