//! Orchestrator test module
//!
//! Runs whole batches through fake collaborators: the decoder reacts to
//! the file content, the encoder tags its output with the format.

#[cfg(test)]
mod fakes {
    use crate::decoder::{DecodeAttempt, Decoded, HeicDecoder, PixelBuffer, PixelLayout, TargetedDecoder};
    use crate::encoder::PixelEncoder;
    use crate::error::{DecodeError, EncodeError};
    use crate::formats::OutputFormat;
    use crate::staging::InputFile;
    use std::sync::mpsc::{Receiver, Sender};
    use std::sync::Mutex;

    pub fn pixels(width: u32, height: u32) -> PixelBuffer {
        PixelBuffer::new(
            width,
            height,
            PixelLayout::Rgb8,
            vec![90; width as usize * height as usize * 3],
        )
        .unwrap()
    }

    /// `ok` decodes, `bad` is malformed, `png` is already encoded, `wide`
    /// decodes to a buffer the encoder rejects.
    pub struct FakeDecoder;

    impl HeicDecoder for FakeDecoder {
        fn decode(&self, bytes: &[u8]) -> Result<Decoded, DecodeError> {
            match bytes {
                b"ok" => Ok(Decoded::Pixels {
                    buffer: pixels(2, 2),
                    target: OutputFormat::Jpeg,
                }),
                b"png" => Ok(Decoded::Encoded {
                    format: OutputFormat::Png,
                    bytes: b"\x89PNG\r\n\x1a\nfake".to_vec(),
                }),
                b"wide" => Ok(Decoded::Pixels {
                    buffer: pixels(7, 1),
                    target: OutputFormat::Jpeg,
                }),
                _ => Err(DecodeError::Malformed("truncated hvcC box".into())),
            }
        }
    }

    pub struct FakeEncoder;

    impl PixelEncoder for FakeEncoder {
        fn encode(
            &self,
            pixels: &PixelBuffer,
            format: OutputFormat,
            _quality: f32,
        ) -> Result<Vec<u8>, EncodeError> {
            if pixels.width() == 7 {
                return Err(EncodeError::Failed {
                    format,
                    reason: "width not supported".into(),
                });
            }
            Ok(format!("{}:{}x{}", format.extension(), pixels.width(), pixels.height()).into_bytes())
        }
    }

    /// Only the PNG target works, like an image with an unsupported JPEG path.
    pub struct PngOnlyBackend;

    impl TargetedDecoder for PngOnlyBackend {
        fn decode_for(&self, _bytes: &[u8], attempt: &DecodeAttempt) -> Result<Decoded, DecodeError> {
            match attempt.target {
                OutputFormat::Png => Ok(Decoded::Pixels {
                    buffer: pixels(1, 1),
                    target: OutputFormat::Png,
                }),
                OutputFormat::Jpeg => Err(DecodeError::Unsupported {
                    target: OutputFormat::Jpeg,
                    reason: "16-bit image".into(),
                }),
            }
        }
    }

    /// Blocks inside `decode` until released.
    pub struct GatedDecoder {
        pub entered: Mutex<Sender<()>>,
        pub release: Mutex<Receiver<()>>,
    }

    impl HeicDecoder for GatedDecoder {
        fn decode(&self, bytes: &[u8]) -> Result<Decoded, DecodeError> {
            let _ = self.entered.lock().unwrap().send(());
            let _ = self.release.lock().unwrap().recv();
            FakeDecoder.decode(bytes)
        }
    }

    pub fn heic(name: &str, content: &[u8]) -> InputFile {
        InputFile::new(name, content.to_vec())
    }

    pub fn batch_of(prefix: &str, n: usize) -> Vec<InputFile> {
        (0..n)
            .map(|i| heic(&format!("{}_{}.heic", prefix, i), b"ok"))
            .collect()
    }
}

#[cfg(test)]
mod run_tests {
    use super::fakes::*;
    use crate::config::{ConcurrencyPolicy, ConvertConfig};
    use crate::decoder::FallbackDecoder;
    use crate::error::{ConvertError, StageError};
    use crate::formats::OutputFormat;
    use crate::observer::BatchEvent;
    use crate::orchestrator::Orchestrator;
    use crate::outcome::{ConversionOutcome, FailureReason};
    use crate::state::BatchStatus;

    fn sequential() -> Orchestrator {
        Orchestrator::new(ConvertConfig::new().with_concurrency(ConcurrencyPolicy::Sequential))
    }

    fn progress_of(rx: &std::sync::mpsc::Receiver<BatchEvent>) -> Vec<u8> {
        rx.try_iter()
            .filter_map(|e| match e {
                BatchEvent::Progress { percent, .. } => Some(percent),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_every_file_completes_exactly_once() {
        let orch = Orchestrator::default();
        let batch = orch.stage(batch_of("IMG", 12)).unwrap();
        let report = orch.run(&batch, &FakeDecoder, &FakeEncoder).unwrap();

        let snapshot = orch.snapshot();
        assert_eq!(snapshot.completed, snapshot.total);
        assert_eq!(snapshot.total, 12);
        assert_eq!(snapshot.status, BatchStatus::Finished);
        assert_eq!(snapshot.progress, 100);

        let mut indexes: Vec<usize> = report.outcomes.iter().map(|o| o.input_index()).collect();
        indexes.sort_unstable();
        assert_eq!(indexes, (0..12).collect::<Vec<_>>());
        assert!(report.aborted.is_none());
        assert!(!report.abandoned);
    }

    #[test]
    fn test_empty_stage_leaves_previous_state() {
        let orch = sequential();
        let batch = orch.stage(batch_of("IMG", 2)).unwrap();
        orch.run(&batch, &FakeDecoder, &FakeEncoder).unwrap();
        let before = orch.snapshot();

        let err = orch
            .stage(vec![heic("a.jpg", b"ok"), heic("b.png", b"ok")])
            .unwrap_err();
        assert_eq!(err, StageError::EmptyBatch { candidates: 2 });
        assert_eq!(orch.snapshot(), before);
        assert_eq!(orch.outcomes().len(), 2);
    }

    #[test]
    fn test_corrupt_middle_file_does_not_stop_batch() {
        let orch = sequential();
        let batch = orch
            .stage(vec![
                heic("a.heic", b"ok"),
                heic("b.heic", b"garbage"),
                heic("c.heic", b"ok"),
            ])
            .unwrap();
        let report = orch.run(&batch, &FakeDecoder, &FakeEncoder).unwrap();

        let names: Vec<&str> = report.successes().map(|s| s.output_name.as_str()).collect();
        assert_eq!(names, vec!["a.jpg", "c.jpg"]);
        let failures: Vec<_> = report.failures().collect();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].input_name, "b.heic");
        assert!(matches!(failures[0].reason, FailureReason::Decode(_)));

        let errors: Vec<String> = orch
            .log_entries()
            .into_iter()
            .filter(|e| e.severity == crate::activity_log::Severity::Error)
            .map(|e| e.message)
            .collect();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].starts_with("b.heic:"), "log names the file: {}", errors[0]);
    }

    #[test]
    fn test_encode_failure_and_passthrough() {
        let orch = sequential();
        let batch = orch
            .stage(vec![heic("wide.heic", b"wide"), heic("shot.heic", b"png")])
            .unwrap();
        let report = orch.run(&batch, &FakeDecoder, &FakeEncoder).unwrap();

        assert!(matches!(
            report.outcomes[0],
            ConversionOutcome::Failure(ref f) if matches!(f.reason, FailureReason::Encode(_))
        ));
        let shot = report.successes().next().unwrap();
        assert_eq!(shot.output_name, "shot.png");
        assert_eq!(shot.mime_type(), "image/png");
    }

    #[test]
    fn test_sequential_progress_steps() {
        let orch = sequential();
        let rx = orch.subscribe();
        let batch = orch.stage(batch_of("IMG", 4)).unwrap();
        orch.run(&batch, &FakeDecoder, &FakeEncoder).unwrap();

        assert_eq!(progress_of(&rx), vec![25, 50, 75, 100]);
    }

    #[test]
    fn test_pooled_progress_is_monotonic() {
        let orch = Orchestrator::new(
            ConvertConfig::new().with_concurrency(ConcurrencyPolicy::Pooled { workers: 4 }),
        );
        let rx = orch.subscribe();
        let batch = orch.stage(batch_of("IMG", 25)).unwrap();
        orch.run(&batch, &FakeDecoder, &FakeEncoder).unwrap();

        let progress = progress_of(&rx);
        assert_eq!(progress.len(), 25);
        assert!(progress.windows(2).all(|w| w[0] <= w[1]), "{:?}", progress);
        assert_eq!(progress.last(), Some(&100));
    }

    #[test]
    fn test_finished_event_emitted_once() {
        let orch = Orchestrator::default();
        let rx = orch.subscribe();
        let batch = orch.stage(batch_of("IMG", 5)).unwrap();
        orch.run(&batch, &FakeDecoder, &FakeEncoder).unwrap();

        let finished: Vec<_> = rx
            .try_iter()
            .filter_map(|e| match e {
                BatchEvent::Finished(s) => Some(s),
                _ => None,
            })
            .collect();
        assert_eq!(finished.len(), 1);
        assert_eq!(finished[0].succeeded, 5);
    }

    #[test]
    fn test_png_fallback_is_named_png() {
        let orch = sequential();
        let batch = orch.stage(vec![heic("deep.heic", b"x")]).unwrap();
        let decoder = FallbackDecoder::for_output(PngOnlyBackend, OutputFormat::Jpeg);
        let report = orch.run(&batch, &decoder, &FakeEncoder).unwrap();

        let success = report.successes().next().unwrap();
        assert_eq!(success.output_name, "deep.png");
        assert_eq!(success.format, OutputFormat::Png);
        assert_eq!(&success.bytes[..], b"png:1x1");
    }

    #[test]
    fn test_unavailable_decoder_aborts_remaining_files() {
        let orch = sequential();
        let batch = orch.stage(batch_of("IMG", 4)).unwrap();
        let decoder = crate::decoder::UnavailableDecoder::new("libheif not found");
        let report = orch.run(&batch, &decoder, &FakeEncoder).unwrap();

        assert_eq!(report.aborted.as_deref(), Some("libheif not found"));
        assert_eq!(report.outcomes.len(), 4);
        let reasons: Vec<&FailureReason> = report.failures().map(|f| &f.reason).collect();
        assert!(matches!(reasons[0], FailureReason::Decode(_)));
        assert!(reasons[1..]
            .iter()
            .all(|r| matches!(r, FailureReason::NotAttempted(_))));
        assert_eq!(report.summary().not_attempted, 3);
        assert_eq!(orch.snapshot().status, BatchStatus::Finished);
    }

    #[test]
    fn test_run_rejects_stale_and_repeated_batches() {
        let orch = sequential();
        let first = orch.stage(batch_of("a", 1)).unwrap();
        let second = orch.stage(batch_of("b", 1)).unwrap();
        assert!(second.generation() > first.generation());

        let err = orch.run(&first, &FakeDecoder, &FakeEncoder).unwrap_err();
        assert!(matches!(err, ConvertError::StaleBatch { .. }));

        orch.run(&second, &FakeDecoder, &FakeEncoder).unwrap();
        let err = orch.run(&second, &FakeDecoder, &FakeEncoder).unwrap_err();
        assert!(matches!(err, ConvertError::AlreadyRun { .. }));
    }

    #[test]
    fn test_log_is_bounded() {
        let orch = Orchestrator::new(
            ConvertConfig::new()
                .with_concurrency(ConcurrencyPolicy::Sequential)
                .with_log_capacity(5),
        );
        let batch = orch.stage(batch_of("IMG", 10)).unwrap();
        orch.run(&batch, &FakeDecoder, &FakeEncoder).unwrap();

        let entries = orch.log_entries();
        assert_eq!(entries.len(), 5);
        assert!(entries.last().unwrap().message.starts_with("Finished"));
    }

    #[test]
    fn test_clear_resets_state() {
        let orch = sequential();
        let batch = orch.stage(batch_of("IMG", 2)).unwrap();
        orch.run(&batch, &FakeDecoder, &FakeEncoder).unwrap();
        orch.clear();

        assert_eq!(orch.snapshot().status, BatchStatus::Idle);
        assert!(orch.outcomes().is_empty());
    }
}

#[cfg(test)]
mod restage_tests {
    use super::fakes::*;
    use crate::config::{ConcurrencyPolicy, ConvertConfig};
    use crate::orchestrator::Orchestrator;
    use std::sync::mpsc;
    use std::sync::{Arc, Mutex};
    use std::thread;

    #[test]
    fn test_restage_during_run_keeps_only_new_outcomes() {
        let orch = Arc::new(Orchestrator::new(
            ConvertConfig::new().with_concurrency(ConcurrencyPolicy::Sequential),
        ));
        let old = orch.stage(batch_of("old", 3)).unwrap();

        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let gated = GatedDecoder {
            entered: Mutex::new(entered_tx),
            release: Mutex::new(release_rx),
        };

        let runner = {
            let orch = Arc::clone(&orch);
            thread::spawn(move || orch.run(&old, &gated, &FakeEncoder))
        };

        // old run is now blocked inside decode of its first file
        entered_rx.recv().unwrap();
        let new = orch.stage(batch_of("new", 2)).unwrap();
        drop(release_tx);

        let old_report = runner.join().unwrap().unwrap();
        assert!(old_report.abandoned);
        assert!(old_report.outcomes.is_empty(), "late outcome must be discarded");

        let report = orch.run(&new, &FakeDecoder, &FakeEncoder).unwrap();
        assert_eq!(report.outcomes.len(), 2);

        let outcomes = orch.outcomes();
        assert_eq!(outcomes.len(), 2);
        assert!(outcomes.iter().all(|o| o.input_name().starts_with("new_")));
        let snapshot = orch.snapshot();
        assert_eq!((snapshot.completed, snapshot.total), (2, 2));
    }
}

#[cfg(test)]
mod archive_tests {
    use super::fakes::*;
    use crate::archive::ZipArchiveWriter;
    use crate::config::{ConcurrencyPolicy, ConvertConfig};
    use crate::decoder::{Decoded, HeicDecoder, SniffingDecoder};
    use crate::encoder::{ImageEncoder, PixelEncoder};
    use crate::error::{ArchiveError, ConvertError, DecodeError};
    use crate::formats::{heif_header, OutputFormat};
    use crate::orchestrator::Orchestrator;
    use std::io::{Cursor, Read};

    fn members(bytes: Vec<u8>) -> Vec<(String, Vec<u8>)> {
        let mut zip = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        (0..zip.len())
            .map(|i| {
                let mut f = zip.by_index(i).unwrap();
                let mut data = Vec::new();
                f.read_to_end(&mut data).unwrap();
                (f.name().to_string(), data)
            })
            .collect()
    }

    #[test]
    fn test_archive_has_one_member_per_success() {
        let orch = Orchestrator::default();
        let mut files = batch_of("IMG", 6);
        files.push(heic("IMG_0.HEIF", b"ok"));
        files.push(heic("broken.heic", b"nope"));
        let batch = orch.stage(files).unwrap();
        orch.run(&batch, &FakeDecoder, &FakeEncoder).unwrap();

        let entries = members(orch.archive(&ZipArchiveWriter::new()).unwrap());
        let names: Vec<&str> = entries.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "IMG_0 (2).jpg",
                "IMG_0.jpg",
                "IMG_1.jpg",
                "IMG_2.jpg",
                "IMG_3.jpg",
                "IMG_4.jpg",
                "IMG_5.jpg"
            ]
        );
        assert!(entries.iter().all(|(_, data)| data == b"jpg:2x2"));
    }

    #[test]
    fn test_archive_without_successes_fails() {
        let orch = Orchestrator::default();
        let batch = orch.stage(vec![heic("broken.heic", b"nope")]).unwrap();
        orch.run(&batch, &FakeDecoder, &FakeEncoder).unwrap();

        let err = orch.archive(&ZipArchiveWriter::new()).unwrap_err();
        assert!(matches!(err, ConvertError::Archive(ArchiveError::NoSuccesses)));
    }

    /// Decodes any HEIF-branded input to a small gradient.
    struct GradientDecoder;

    impl HeicDecoder for GradientDecoder {
        fn decode(&self, bytes: &[u8]) -> Result<Decoded, DecodeError> {
            if bytes.len() < 12 {
                return Err(DecodeError::Malformed("too short".into()));
            }
            Ok(Decoded::Pixels {
                buffer: pixels(16, 8),
                target: OutputFormat::Jpeg,
            })
        }
    }

    #[test]
    fn test_end_to_end_with_image_encoder() {
        let real_jpeg = ImageEncoder.encode(&pixels(4, 4), OutputFormat::Jpeg, 0.8).unwrap();
        let real_png = ImageEncoder.encode(&pixels(3, 3), OutputFormat::Png, 1.0).unwrap();

        let orch = Orchestrator::new(
            ConvertConfig::new().with_concurrency(ConcurrencyPolicy::Pooled { workers: 2 }),
        );
        let batch = orch
            .stage(vec![
                heic("camera.heic", &heif_header(b"heic", &[b"mif1"])),
                heic("renamed.heic", &real_jpeg),
                heic("screenshot.heic", &real_png),
                heic("empty.heic", b""),
            ])
            .unwrap();
        let decoder = SniffingDecoder::new(GradientDecoder);
        let report = orch.run(&batch, &decoder, &ImageEncoder).unwrap();

        let summary = report.summary();
        assert_eq!(summary.succeeded, 3);
        assert_eq!(summary.failed, 1);

        let entries = members(orch.archive(&ZipArchiveWriter::new()).unwrap());
        let names: Vec<&str> = entries.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["camera.jpg", "renamed.jpg", "screenshot.png"]);

        let camera = image::load_from_memory(&entries[0].1).unwrap();
        assert_eq!((camera.width(), camera.height()), (16, 8));
        assert_eq!(entries[1].1, real_jpeg, "already-encoded JPEG passes through untouched");
        assert_eq!(entries[2].1, real_png);
    }

    #[cfg(feature = "libheif")]
    #[test]
    fn test_default_decoder_reads_heif_without_aborting() {
        let real_png = ImageEncoder.encode(&pixels(2, 2), OutputFormat::Png, 1.0).unwrap();
        let orch = Orchestrator::new(
            ConvertConfig::new().with_concurrency(ConcurrencyPolicy::Sequential),
        );
        let batch = orch
            .stage(vec![
                heic("a.heic", &heif_header(b"heic", &[b"mif1"])),
                heic("b.heic", &real_png),
            ])
            .unwrap();
        let decoder = crate::decoder::default_decoder(OutputFormat::Jpeg);
        let report = orch.run(&batch, decoder.as_ref(), &ImageEncoder).unwrap();

        assert_eq!(report.aborted, None, "libheif is linked in the default build");
        let failure = report.failures().next().unwrap();
        assert_eq!(failure.input_name, "a.heic");
        assert!(
            !failure.reason.to_string().contains("unavailable"),
            "truncated container is a per-file decode failure: {}",
            failure.reason
        );
        assert_eq!(report.summary().succeeded, 1);
    }
}
