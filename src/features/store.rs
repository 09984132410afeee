use std::collections::{HashMap, HashSet};
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use ndarray::Array2;
use serde::Deserialize;
use tempfile::NamedTempFile;
use tracing::{debug, error};

use crate::error::{Result, VadError};
use crate::features::aggregator::{aggregate, SegmentedRepresentation};
use crate::features::NUM_SEGMENTS;

/// Identifies one video's feature file: `{root}/{subdir}/{name}.txt`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VideoKey {
    root: PathBuf,
    subdir: String,
    name: String,
}

impl VideoKey {
    pub fn new(root: impl Into<PathBuf>, subdir: impl Into<String>, name: impl Into<String>) -> Self {
        VideoKey {
            root: root.into(),
            subdir: subdir.into(),
            name: name.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn subdir(&self) -> &str {
        &self.subdir
    }

    /// Directory holding the feature file.
    pub fn dir(&self) -> PathBuf {
        self.root.join(&self.subdir)
    }

    pub fn path(&self) -> PathBuf {
        self.dir().join(format!("{}.txt", self.name))
    }

    /// Root-independent identifier, `subdir/name` (or `name` without a subdir).
    pub fn id(&self) -> String {
        if self.subdir.is_empty() {
            self.name.clone()
        } else {
            format!("{}/{}", self.subdir, self.name)
        }
    }
}

impl fmt::Display for VideoKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id())
    }
}

/// One extracted clip feature, as emitted by an external extractor.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ClipFeature {
    pub subdir: String,
    pub video: String,
    pub start_frame: u64,
    pub features: Vec<f32>,
}

impl ClipFeature {
    pub fn key(&self, root: &Path) -> VideoKey {
        VideoKey::new(root, self.subdir.clone(), self.video.clone())
    }
}

struct PendingVideo {
    key: VideoKey,
    dim: usize,
    clips: HashMap<u64, Vec<f32>>,
}

/// Single-writer sink that buffers one video at a time and persists it when
/// the stream moves on to the next video.
///
/// Producers must not return to a video once they have moved past it. The
/// pending video is flushed by `flush`/`finish`, or on drop as a last resort.
pub struct FeaturesWriter {
    pending: Option<PendingVideo>,
    flushed: HashSet<VideoKey>,
}

impl FeaturesWriter {
    pub fn new() -> Self {
        FeaturesWriter {
            pending: None,
            flushed: HashSet::new(),
        }
    }

    /// Key of the video currently being accumulated.
    pub fn current(&self) -> Option<&VideoKey> {
        self.pending.as_ref().map(|pending| &pending.key)
    }

    /// Distinct clips buffered for the current video.
    pub fn pending_len(&self) -> usize {
        self.pending.as_ref().map_or(0, |pending| pending.clips.len())
    }

    /// Whether `key` was already persisted by this writer.
    pub fn was_written(&self, key: &VideoKey) -> bool {
        self.flushed.contains(key)
    }

    /// Number of videos persisted so far.
    pub fn videos_written(&self) -> usize {
        self.flushed.len()
    }

    /// Buffer one clip feature. A key different from the current one flushes
    /// the current video first; the new clip is buffered even if that flush fails.
    pub fn write(&mut self, feature: Vec<f32>, key: &VideoKey, start_frame: u64) -> Result<()> {
        if self.was_written(key) {
            return Err(VadError::VideoRevisited { path: key.path() });
        }

        let switching = self
            .pending
            .as_ref()
            .is_some_and(|pending| &pending.key != key);
        if feature.is_empty() && (switching || self.pending.is_none()) {
            return Err(VadError::EmptyFeatureVector { start_frame });
        }
        let previous = if switching { self.pending.take() } else { None };

        match self.pending.as_mut() {
            Some(pending) => {
                if feature.len() != pending.dim {
                    return Err(VadError::DimensionMismatch {
                        start_frame,
                        expected: pending.dim,
                        actual: feature.len(),
                    });
                }
                pending.clips.insert(start_frame, feature);
            }
            None => {
                let mut clips = HashMap::new();
                let dim = feature.len();
                clips.insert(start_frame, feature);
                self.pending = Some(PendingVideo {
                    key: key.clone(),
                    dim,
                    clips,
                });
            }
        }

        match previous {
            Some(previous) => self.persist(previous),
            None => Ok(()),
        }
    }

    /// Persist the pending video, if any. A writer that never saw a clip flushes nothing.
    pub fn flush(&mut self) -> Result<()> {
        match self.pending.take() {
            Some(pending) => self.persist(pending),
            None => Ok(()),
        }
    }

    /// Drop the pending video without writing it, returning its key.
    pub fn discard(&mut self) -> Option<VideoKey> {
        self.pending.take().map(|pending| pending.key)
    }

    /// Flush the pending video and consume the writer.
    pub fn finish(mut self) -> Result<()> {
        self.flush()
    }

    fn persist(&mut self, pending: PendingVideo) -> Result<()> {
        let PendingVideo { key, clips, .. } = pending;
        if clips.is_empty() {
            return Err(VadError::EmptyVideo);
        }
        let clip_count = clips.len();
        let segments = aggregate(clips)?;
        write_segments(&key, &segments)?;
        debug!(video = %key, path = %key.path().display(), clips = clip_count, "dumped features");
        self.flushed.insert(key);
        Ok(())
    }
}

impl Default for FeaturesWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for FeaturesWriter {
    fn drop(&mut self) {
        if let Some(pending) = self.pending.take() {
            let key = pending.key.clone();
            if let Err(err) = self.persist(pending) {
                error!(video = %key, error = %err, "failed to flush pending video on drop");
            }
        }
    }
}

/// Render segments as text: one line per segment, space-separated values.
pub fn format_segments(segments: &SegmentedRepresentation) -> String {
    let mut content = String::new();
    for segment in segments.view().outer_iter() {
        let line: Vec<String> = segment.iter().map(|value| value.to_string()).collect();
        content.push_str(&line.join(" "));
        content.push('\n');
    }
    content
}

/// Atomically write a video's segments to its feature file, creating directories as needed.
pub fn write_segments(key: &VideoKey, segments: &SegmentedRepresentation) -> Result<()> {
    let dir = key.dir();
    let path = key.path();
    fs::create_dir_all(&dir).map_err(|source| VadError::io(&dir, source))?;

    let content = format_segments(segments);
    let mut file = NamedTempFile::new_in(&dir).map_err(|source| VadError::io(&dir, source))?;
    file.write_all(content.as_bytes())
        .map_err(|source| VadError::io(file.path(), source))?;
    file.persist(&path)
        .map_err(|err| VadError::io(&path, err.error))?;
    Ok(())
}

/// Load a video's segments. The feature width is taken from the first line
/// and every other line must match it.
pub fn read_features(key: &VideoKey) -> Result<SegmentedRepresentation> {
    let path = key.path();
    if !path.exists() {
        return Err(VadError::MissingFeatureFile { path });
    }
    let content = fs::read_to_string(&path).map_err(|source| VadError::io(&path, source))?;
    parse_segments(&content, &path)
}

fn parse_segments(content: &str, path: &Path) -> Result<SegmentedRepresentation> {
    let malformed = |line: usize, reason: String| VadError::MalformedFeatureLine {
        path: path.to_path_buf(),
        line,
        reason,
    };

    let mut values = Vec::new();
    let mut dim = None;
    let mut rows = 0;
    for (index, line) in content.lines().enumerate() {
        let line_no = index + 1;
        let mut width = 0;
        for token in line.split_whitespace() {
            let value = token
                .parse::<f32>()
                .map_err(|err| malformed(line_no, format!("cannot parse {token:?}: {err}")))?;
            values.push(value);
            width += 1;
        }
        if width == 0 {
            return Err(malformed(line_no, "line has no values".to_string()));
        }
        match dim {
            None => dim = Some(width),
            Some(expected) if expected != width => {
                return Err(malformed(
                    line_no,
                    format!("expected {expected} values, found {width}"),
                ));
            }
            Some(_) => {}
        }
        rows += 1;
    }

    let Some(dim) = dim else {
        return Err(malformed(1, "file is empty".to_string()));
    };
    if rows != NUM_SEGMENTS {
        return Err(VadError::SegmentCountMismatch {
            context: path.display().to_string(),
            expected: NUM_SEGMENTS,
            actual: rows,
        });
    }
    let segments = Array2::from_shape_vec((rows, dim), values)
        .map_err(|err| malformed(rows, err.to_string()))?;
    SegmentedRepresentation::from_array(segments, &path.display().to_string())
}

#[cfg(feature = "python")]
pub mod python {
    use std::path::PathBuf;

    use numpy::{IntoPyArray, PyArray2, PyReadonlyArray1};
    use pyo3::prelude::*;

    use super::VideoKey;

    /// Python-exposed wrapper around FeaturesWriter, usable as a context manager.
    #[pyclass(unsendable, name = "FeaturesWriter")]
    pub struct PyFeaturesWriter {
        inner: super::FeaturesWriter,
        root: PathBuf,
    }

    #[pymethods]
    impl PyFeaturesWriter {
        #[new]
        #[pyo3(signature = (save_dir))]
        fn new(save_dir: PathBuf) -> Self {
            PyFeaturesWriter {
                inner: super::FeaturesWriter::new(),
                root: save_dir,
            }
        }

        fn write(
            &mut self,
            feature: PyReadonlyArray1<f32>,
            subdir: &str,
            video_name: &str,
            start_frame: u64,
        ) -> PyResult<()> {
            let key = VideoKey::new(&self.root, subdir, video_name);
            let feature = feature.as_array().to_vec();
            Ok(self.inner.write(feature, &key, start_frame)?)
        }

        fn flush(&mut self) -> PyResult<()> {
            Ok(self.inner.flush()?)
        }

        fn __enter__(slf: PyRefMut<'_, Self>) -> PyRefMut<'_, Self> {
            slf
        }

        fn __exit__(
            &mut self,
            _exc_type: &PyAny,
            _exc_value: &PyAny,
            _traceback: &PyAny,
        ) -> PyResult<bool> {
            self.inner.flush()?;
            Ok(false)
        }
    }

    #[pyfunction]
    pub fn read_features<'py>(
        py: Python<'py>,
        save_dir: PathBuf,
        subdir: &str,
        video_name: &str,
    ) -> PyResult<&'py PyArray2<f32>> {
        let key = VideoKey::new(save_dir, subdir, video_name);
        let segments = super::read_features(&key)?;
        Ok(segments.into_inner().into_pyarray(py))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn random_representation(rng: &mut StdRng, dim: usize) -> SegmentedRepresentation {
        let values = (0..NUM_SEGMENTS * dim)
            .map(|_| rng.gen_range(-1.0f32..1.0))
            .collect();
        let array = Array2::from_shape_vec((NUM_SEGMENTS, dim), values).expect("shape");
        SegmentedRepresentation::from_array(array, "test").expect("representation")
    }

    #[test]
    fn key_path_layout() {
        let key = VideoKey::new("/out", "Arson", "Arson011_x264");
        assert_eq!(key.path(), PathBuf::from("/out/Arson/Arson011_x264.txt"));
        assert_eq!(key.id(), "Arson/Arson011_x264");
        assert_eq!(VideoKey::new("/out", "", "v").id(), "v");
    }

    #[test]
    fn round_trips_exactly() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut rng = StdRng::seed_from_u64(42);
        for dim in [1, 7, 2048] {
            let key = VideoKey::new(dir.path(), "sub", format!("video_{dim}"));
            let segments = random_representation(&mut rng, dim);
            write_segments(&key, &segments).expect("write");
            let loaded = read_features(&key).expect("read");
            assert_eq!(loaded, segments);
        }
    }

    #[test]
    fn file_has_one_line_per_segment() {
        let dir = tempfile::tempdir().expect("tempdir");
        let key = VideoKey::new(dir.path(), "sub", "v");
        let mut rng = StdRng::seed_from_u64(1);
        write_segments(&key, &random_representation(&mut rng, 5)).expect("write");

        let content = fs::read_to_string(key.path()).expect("content");
        assert!(content.ends_with('\n'));
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), NUM_SEGMENTS);
        assert!(lines.iter().all(|line| line.split(' ').count() == 5));
    }

    #[test]
    fn missing_file_is_reported() {
        let dir = tempfile::tempdir().expect("tempdir");
        let key = VideoKey::new(dir.path(), "sub", "absent");
        let err = read_features(&key).unwrap_err();
        assert!(matches!(err, VadError::MissingFeatureFile { .. }));
    }

    #[test]
    fn reader_rejects_ragged_and_garbage_lines() {
        let path = Path::new("mem.txt");
        let mut ragged = "1 2 3\n".repeat(NUM_SEGMENTS - 1);
        ragged.push_str("1 2\n");
        let err = parse_segments(&ragged, path).unwrap_err();
        assert!(matches!(err, VadError::MalformedFeatureLine { line: 32, .. }));

        let err = parse_segments("1 x 3\n", path).unwrap_err();
        assert!(matches!(err, VadError::MalformedFeatureLine { line: 1, .. }));

        let err = parse_segments("1 2\n\n", path).unwrap_err();
        assert!(matches!(err, VadError::MalformedFeatureLine { line: 2, .. }));

        let err = parse_segments("", path).unwrap_err();
        assert!(matches!(err, VadError::MalformedFeatureLine { .. }));
    }

    #[test]
    fn reader_infers_width_and_requires_thirty_two_lines() {
        let path = Path::new("mem.txt");
        let content = "0.5 -1e-3 2\r\n".repeat(NUM_SEGMENTS);
        let segments = parse_segments(&content, path).expect("parse");
        assert_eq!(segments.dim(), 3);
        assert_eq!(segments.segment(31)[1], -0.001);

        let err = parse_segments(&"1 2\n".repeat(10), path).unwrap_err();
        assert!(matches!(
            err,
            VadError::SegmentCountMismatch { actual: 10, .. }
        ));
    }

    #[test]
    fn writer_flushes_on_video_change_and_finish() {
        let dir = tempfile::tempdir().expect("tempdir");
        let first = VideoKey::new(dir.path(), "a", "first");
        let second = VideoKey::new(dir.path(), "b", "second");

        let mut writer = FeaturesWriter::new();
        writer.flush().expect("flush before any write is a no-op");
        writer.write(vec![1.0, 0.0], &first, 16).expect("write");
        writer.write(vec![0.0, 1.0], &first, 0).expect("write");
        assert!(!first.path().exists());

        writer.write(vec![1.0, 1.0], &second, 0).expect("write");
        assert!(first.path().exists());
        assert!(!second.path().exists());
        assert_eq!(writer.current(), Some(&second));

        writer.finish().expect("finish");
        assert!(second.path().exists());

        let loaded = read_features(&first).expect("read");
        // Sorted by start frame: frame 0 clip first.
        assert_eq!(loaded.segment(0).to_vec(), vec![0.0, 1.0]);
        assert_eq!(loaded.segment(1).to_vec(), vec![1.0, 0.0]);
    }

    #[test]
    fn writer_flushes_pending_video_on_drop() {
        let dir = tempfile::tempdir().expect("tempdir");
        let key = VideoKey::new(dir.path(), "a", "dropped");
        {
            let mut writer = FeaturesWriter::new();
            writer.write(vec![2.0], &key, 0).expect("write");
        }
        assert!(key.path().exists());
    }

    #[test]
    fn writer_rejects_revisits_and_dimension_changes() {
        let dir = tempfile::tempdir().expect("tempdir");
        let first = VideoKey::new(dir.path(), "a", "first");
        let second = VideoKey::new(dir.path(), "a", "second");

        let mut writer = FeaturesWriter::new();
        writer.write(vec![1.0, 2.0], &first, 0).expect("write");
        let err = writer.write(vec![1.0], &first, 16).unwrap_err();
        assert!(matches!(err, VadError::DimensionMismatch { .. }));

        writer.write(vec![1.0], &second, 0).expect("write");
        let err = writer.write(vec![1.0, 2.0], &first, 32).unwrap_err();
        assert!(matches!(err, VadError::VideoRevisited { .. }));
        assert_eq!(writer.current(), Some(&second));
        assert_eq!(writer.videos_written(), 1);
    }

    #[test]
    fn failed_write_leaves_existing_file_and_no_temp_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut rng = StdRng::seed_from_u64(9);
        let intact = VideoKey::new(dir.path(), "sub", "intact");
        write_segments(&intact, &random_representation(&mut rng, 4)).expect("write");
        let before = fs::read(intact.path()).expect("read");

        // A directory squatting on the target path makes the final rename fail.
        let blocked = VideoKey::new(dir.path(), "sub", "blocked");
        fs::create_dir_all(blocked.path()).expect("mkdir");
        let err = write_segments(&blocked, &random_representation(&mut rng, 4)).unwrap_err();
        assert!(matches!(err, VadError::Io { .. }));

        let mut writer = FeaturesWriter::new();
        writer.write(vec![1.0, 2.0], &blocked, 0).expect("buffer");
        let err = writer.finish().unwrap_err();
        assert!(matches!(err, VadError::Io { .. }));

        assert_eq!(fs::read(intact.path()).expect("read"), before);
        let mut entries: Vec<String> = fs::read_dir(intact.dir())
            .expect("list")
            .map(|entry| entry.expect("entry").file_name().to_string_lossy().into_owned())
            .collect();
        entries.sort();
        assert_eq!(entries, vec!["blocked.txt", "intact.txt"]);
    }

    #[test]
    fn discard_drops_pending_video() {
        let dir = tempfile::tempdir().expect("tempdir");
        let key = VideoKey::new(dir.path(), "a", "discarded");
        let mut writer = FeaturesWriter::new();
        writer.write(vec![1.0], &key, 0).expect("write");
        assert_eq!(writer.discard(), Some(key.clone()));
        writer.finish().expect("finish");
        assert!(!key.path().exists());
    }
}
