//! Directory listing and WAV decoding.

use std::fs;
use std::path::{Path, PathBuf};

use hound::{SampleFormat, WavReader};
use ndarray::Array1;

use crate::{AudioSignal, CrosswalkError, CrosswalkResult};

/// True when the file name ends in `.wav` or `.WAV`.
///
/// Mixed-case suffixes such as `.Wav` are not accepted.
pub fn is_wav_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.ends_with(".wav") || name.ends_with(".WAV"))
}

/// Regular files directly inside `dir`, sorted by path.
pub fn list_regular_files(dir: &Path) -> CrosswalkResult<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}

/// Clip identifier of `path`: the file name up to its first `.`.
///
/// `take.2.wav` and `take.wav` therefore share the identifier `take` and
/// append to the same label file. A name that starts with a `.` falls back
/// to the name without its last extension.
pub fn clip_id(path: &Path) -> String {
    let Some(name) = path.file_name().map(|name| name.to_string_lossy()) else {
        return String::new();
    };
    match name.split('.').next() {
        Some(head) if !head.is_empty() => head.to_string(),
        _ => path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default(),
    }
}

/// Decodes a WAV file into a mono signal at its native sample rate.
///
/// Integer samples are scaled to `[-1, 1)`; float samples are passed through.
/// Multi-channel files are downmixed by averaging the channels of each frame.
///
/// # Errors
///
/// Returns [`CrosswalkError::Io`] when the file cannot be read and
/// [`CrosswalkError::Decode`] for malformed or unsupported WAV data.
pub fn load_wav(path: &Path) -> CrosswalkResult<AudioSignal> {
    let reader = WavReader::open(path)?;
    let spec = reader.spec();
    let channels = usize::from(spec.channels.max(1));

    let interleaved: Vec<f64> = match spec.sample_format {
        SampleFormat::Float => reader
            .into_samples::<f32>()
            .map(|s| s.map(f64::from))
            .collect::<Result<_, _>>()?,
        SampleFormat::Int => {
            if spec.bits_per_sample == 0 || spec.bits_per_sample > 32 {
                return Err(CrosswalkError::Decode(format!(
                    "unsupported bit depth {}",
                    spec.bits_per_sample
                )));
            }
            let scale = f64::from(1u32 << (spec.bits_per_sample - 1));
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| f64::from(v) / scale))
                .collect::<Result<_, _>>()?
        }
    };

    let samples: Array1<f64> = if channels == 1 {
        Array1::from(interleaved)
    } else {
        interleaved
            .chunks_exact(channels)
            .map(|frame| frame.iter().sum::<f64>() / channels as f64)
            .collect()
    };

    tracing::debug!(
        path = %path.display(),
        sample_rate = spec.sample_rate,
        channels,
        samples = samples.len(),
        "wav decoded"
    );
    Ok(AudioSignal::new_mono(samples, spec.sample_rate))
}

#[cfg(test)]
mod tests {
    use super::*;
    use hound::{WavSpec, WavWriter};

    fn write_wav(path: &Path, spec: WavSpec, samples: &[i16]) {
        let mut writer = WavWriter::create(path, spec).unwrap();
        for &s in samples {
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn test_wav_suffix() {
        assert!(is_wav_file(Path::new("a/clip.wav")));
        assert!(is_wav_file(Path::new("CLIP.WAV")));
        assert!(!is_wav_file(Path::new("clip.Wav")));
        assert!(!is_wav_file(Path::new("clip.txt")));
        assert!(!is_wav_file(Path::new("wav")));
    }

    #[test]
    fn test_clip_id() {
        assert_eq!(clip_id(Path::new("/tmp/rec_01.wav")), "rec_01");
        assert_eq!(clip_id(Path::new("/tmp/corner.2024.06.WAV")), "corner");
        assert_eq!(clip_id(Path::new("noext")), "noext");
        assert_eq!(clip_id(Path::new(".hidden.wav")), ".hidden");
    }

    #[test]
    fn test_load_stereo_downmix() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stereo.wav");
        let spec = WavSpec {
            channels: 2,
            sample_rate: 22050,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        write_wav(&path, spec, &[16384, 0, -16384, -16384]);

        let audio = load_wav(&path).unwrap();
        assert_eq!(audio.sample_rate(), 22050);
        assert_eq!(audio.samples().to_vec(), vec![0.25, -0.5]);
    }

    #[test]
    fn test_load_float_wav() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("float.wav");
        let spec = WavSpec {
            channels: 1,
            sample_rate: 8000,
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        };
        let mut writer = WavWriter::create(&path, spec).unwrap();
        writer.write_sample(0.5f32).unwrap();
        writer.write_sample(-0.25f32).unwrap();
        writer.finalize().unwrap();

        let audio = load_wav(&path).unwrap();
        assert_eq!(audio.samples().to_vec(), vec![0.5, -0.25]);
    }

    #[test]
    fn test_load_garbage_is_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.wav");
        std::fs::write(&path, b"not a riff file").unwrap();
        assert!(matches!(load_wav(&path), Err(CrosswalkError::Decode(_))));
    }

    #[test]
    fn test_list_regular_files_skips_dirs() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.wav"), b"").unwrap();
        std::fs::write(dir.path().join("a.txt"), b"").unwrap();
        std::fs::create_dir(dir.path().join("sub.wav")).unwrap();

        let files = list_regular_files(dir.path()).unwrap();
        let names: Vec<_> = files.iter().map(|p| clip_id(p)).collect();
        assert_eq!(names, vec!["a", "b"]);
    }
}
