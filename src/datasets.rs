//! Dataset loading: MNIST IDX files and the XOR toy set.
use crate::error::{NnError, Result};
use crate::matrix::Matrix;
use anyhow::{bail, Context};
use byteorder::{BigEndian, ReadBytesExt};
use flate2::read::GzDecoder;
use std::fs::File;
use std::io::{Cursor, Read};
use std::path::Path;
use tracing::info;

const IMAGE_MAGIC: u32 = 2051;
const LABEL_MAGIC: u32 = 2049;
pub const MNIST_CLASSES: usize = 10;

/// One training example: a `1 x n` input row and its `1 x k` target row.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub input: Matrix,
    pub target: Matrix,
}

impl Sample {
    /// Example with a one-hot target for `label`.
    pub fn new(input: &[f64], label: usize, num_classes: usize) -> Result<Self> {
        Ok(Self {
            input: Matrix::row_vector(input)?,
            target: one_hot(label, num_classes)?,
        })
    }

    /// Example with an arbitrary target row.
    pub fn from_rows(input: &[f64], target: &[f64]) -> Result<Self> {
        Ok(Self {
            input: Matrix::row_vector(input)?,
            target: Matrix::row_vector(target)?,
        })
    }

    /// Class index of a one-hot target.
    pub fn label(&self) -> usize {
        self.target.argmax_row(0)
    }
}

/// One-hot encode
pub fn one_hot(label: usize, num_classes: usize) -> Result<Matrix> {
    if label >= num_classes {
        return Err(NnError::InvalidConfig(format!(
            "label {} out of range for {} classes",
            label, num_classes
        )));
    }
    let mut m = Matrix::zeros(1, num_classes)?;
    m.set(0, label, 1.0);
    Ok(m)
}

/// The four XOR examples with single-unit targets.
pub fn xor() -> Result<Vec<Sample>> {
    [
        ([0.0, 0.0], 0.0),
        ([0.0, 1.0], 1.0),
        ([1.0, 0.0], 1.0),
        ([1.0, 1.0], 0.0),
    ]
    .iter()
    .map(|(x, t)| Sample::from_rows(x, &[*t]))
    .collect()
}

/// Contents of an IDX file after its header.
#[derive(Debug)]
struct IdxData {
    sizes: Vec<usize>,
    data: Vec<u8>,
}

impl IdxData {
    fn open(path: &Path) -> anyhow::Result<Self> {
        let file =
            File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
        let mut contents = Vec::new();
        if path.extension().map_or(false, |ext| ext == "gz") {
            GzDecoder::new(file)
                .read_to_end(&mut contents)
                .with_context(|| format!("Gzip read error in {}", path.display()))?;
        } else {
            let mut file = file;
            file.read_to_end(&mut contents)
                .with_context(|| format!("Read error in {}", path.display()))?;
        }
        Self::parse(&contents).with_context(|| format!("Invalid IDX file {}", path.display()))
    }

    fn parse(contents: &[u8]) -> anyhow::Result<Self> {
        let mut r = Cursor::new(contents);
        let magic = r.read_u32::<BigEndian>().context("Read magic")?;
        let dims = match magic {
            LABEL_MAGIC => 1,
            IMAGE_MAGIC => 3,
            _ => bail!("Invalid magic: {}", magic),
        };
        let mut sizes = Vec::with_capacity(dims);
        for _ in 0..dims {
            sizes.push(r.read_u32::<BigEndian>().context("Read dimension")? as usize);
        }
        let offset = r.position() as usize;
        let data = contents[offset..].to_vec();
        let expected = sizes
            .iter()
            .try_fold(1usize, |acc, &s| acc.checked_mul(s))
            .with_context(|| format!("Header dimensions {:?} overflow", sizes))?;
        if data.len() < expected {
            bail!("Truncated data: expected {} bytes, found {}", expected, data.len());
        }
        Ok(Self { sizes, data })
    }
}

/// Load MNIST images and labels, normalising pixels to `[0, 1]` and
/// one-hot encoding labels. Paths ending in `.gz` are decompressed.
/// `limit` keeps only the first `limit` examples, in file order.
pub fn load_mnist(
    images_path: impl AsRef<Path>,
    labels_path: impl AsRef<Path>,
    limit: Option<usize>,
) -> anyhow::Result<Vec<Sample>> {
    let images = IdxData::open(images_path.as_ref())?;
    let labels = IdxData::open(labels_path.as_ref())?;
    if images.sizes.len() != 3 {
        bail!("{} is not an image file", images_path.as_ref().display());
    }
    if labels.sizes.len() != 1 {
        bail!("{} is not a label file", labels_path.as_ref().display());
    }
    let (num_images, rows, cols) = (images.sizes[0], images.sizes[1], images.sizes[2]);
    if num_images != labels.sizes[0] {
        bail!(
            "Image count {} does not match label count {}",
            num_images,
            labels.sizes[0]
        );
    }
    let count = limit.map_or(num_images, |l| l.min(num_images));
    let image_size = rows
        .checked_mul(cols)
        .with_context(|| format!("Image size {}x{} overflows", rows, cols))?;
    info!(count, rows, cols, "loading MNIST images");

    let mut samples = Vec::with_capacity(count);
    for (i, &label) in labels.data.iter().take(count).enumerate() {
        let start = i * image_size;
        let pixels: Vec<f64> = images.data[start..start + image_size]
            .iter()
            .map(|&b| b as f64 / 255.0)
            .collect();
        let sample = Sample::new(&pixels, label as usize, MNIST_CLASSES)
            .with_context(|| format!("Sample {}", i))?;
        samples.push(sample);
    }
    if samples.is_empty() {
        bail!("No MNIST data loaded");
    }
    info!(loaded = samples.len(), "MNIST loading complete");
    Ok(samples)
}

#[cfg(test)]
mod tests {
    use super::*;
    use byteorder::WriteBytesExt;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;
    use tempfile::TempDir;

    fn idx_images(pixels: &[[u8; 4]]) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.write_u32::<BigEndian>(IMAGE_MAGIC).unwrap();
        buf.write_u32::<BigEndian>(pixels.len() as u32).unwrap();
        buf.write_u32::<BigEndian>(2).unwrap();
        buf.write_u32::<BigEndian>(2).unwrap();
        for p in pixels {
            buf.extend_from_slice(p);
        }
        buf
    }

    fn idx_labels(labels: &[u8]) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.write_u32::<BigEndian>(LABEL_MAGIC).unwrap();
        buf.write_u32::<BigEndian>(labels.len() as u32).unwrap();
        buf.extend_from_slice(labels);
        buf
    }

    fn write(dir: &TempDir, name: &str, bytes: &[u8]) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let mut file = File::create(&path).unwrap();
        if name.ends_with(".gz") {
            let mut enc = GzEncoder::new(file, Compression::default());
            enc.write_all(bytes).unwrap();
            enc.finish().unwrap();
        } else {
            file.write_all(bytes).unwrap();
        }
        path
    }

    #[test]
    fn test_one_hot() {
        let m = one_hot(3, 5).unwrap();
        assert_eq!(m.as_slice(), &[0.0, 0.0, 0.0, 1.0, 0.0]);
        assert!(one_hot(5, 5).is_err());
    }

    #[test]
    fn test_xor_set() {
        let set = xor().unwrap();
        assert_eq!(set.len(), 4);
        assert_eq!(set[1].input.as_slice(), &[0.0, 1.0]);
        assert_eq!(set[3].target.as_slice(), &[0.0]);
    }

    #[test]
    fn test_load_raw_idx() {
        let dir = TempDir::new().unwrap();
        let images = write(&dir, "imgs", &idx_images(&[[0, 255, 51, 0], [255, 255, 0, 0]]));
        let labels = write(&dir, "lbls", &idx_labels(&[7, 2]));
        let samples = load_mnist(&images, &labels, None).unwrap();
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].input.as_slice(), &[0.0, 1.0, 0.2, 0.0]);
        assert_eq!(samples[0].label(), 7);
        assert_eq!(samples[1].label(), 2);
        assert_eq!(samples[1].target.sum(), 1.0);
    }

    #[test]
    fn test_load_gzip_with_limit() {
        let dir = TempDir::new().unwrap();
        let images = write(&dir, "imgs.gz", &idx_images(&[[1, 2, 3, 4]; 3]));
        let labels = write(&dir, "lbls.gz", &idx_labels(&[0, 1, 2]));
        let samples = load_mnist(&images, &labels, Some(2)).unwrap();
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[1].label(), 1);
    }

    #[test]
    fn test_count_mismatch() {
        let dir = TempDir::new().unwrap();
        let images = write(&dir, "imgs", &idx_images(&[[0; 4]; 2]));
        let labels = write(&dir, "lbls", &idx_labels(&[1]));
        assert!(load_mnist(&images, &labels, None).is_err());
    }

    #[test]
    fn test_bad_magic_and_truncation() {
        let dir = TempDir::new().unwrap();
        let labels = write(&dir, "lbls", &idx_labels(&[1]));
        let swapped = write(&dir, "swapped", &idx_labels(&[1]));
        assert!(load_mnist(&swapped, &labels, None).is_err());

        let mut short = idx_images(&[[0; 4]]);
        short.truncate(short.len() - 1);
        let images = write(&dir, "short", &short);
        assert!(load_mnist(&images, &labels, None).is_err());
    }

    #[test]
    fn test_oversized_header_is_rejected() {
        let mut header = Vec::new();
        header.write_u32::<BigEndian>(IMAGE_MAGIC).unwrap();
        header.write_u32::<BigEndian>(4).unwrap();
        header.write_u32::<BigEndian>(1 << 31).unwrap();
        header.write_u32::<BigEndian>(1 << 31).unwrap();
        header.extend_from_slice(&[0; 16]);
        assert!(IdxData::parse(&header).is_err());

        let dir = TempDir::new().unwrap();
        let images = write(&dir, "huge", &header);
        let labels = write(&dir, "lbls", &idx_labels(&[0, 1, 2, 3]));
        assert!(load_mnist(&images, &labels, None).is_err());
    }

    #[test]
    fn test_label_out_of_range() {
        let dir = TempDir::new().unwrap();
        let images = write(&dir, "imgs", &idx_images(&[[0; 4]]));
        let labels = write(&dir, "lbls", &idx_labels(&[10]));
        assert!(load_mnist(&images, &labels, None).is_err());
    }

    #[test]
    fn test_missing_file() {
        assert!(load_mnist("/nonexistent/images", "/nonexistent/labels", None).is_err());
    }
}
