use crate::output;
use anyhow::Result;
use image::{DynamicImage, Rgb, RgbImage};
use rand::Rng;
use std::path::{Path, PathBuf};

/// Pixel cap applied before clustering; larger inputs are downscaled.
pub const MAX_CLUSTER_PIXELS: u64 = 1_000_000;

/// Population cap for the density estimate used during mode seeking.
const MODE_POPULATION: usize = 20_000;

/// Upper bound on bin seeds fed to mode seeking.
const MAX_SEEDS: usize = 2_000;

pub struct MeanShiftResult {
    pub image: RgbImage,
    pub clusters: usize,
    pub bandwidth: f32,
}

pub struct KMeansResult {
    pub image: RgbImage,
    pub centroids: Vec<[u8; 3]>,
}

fn dist2(a: [f32; 3], b: [f32; 3]) -> f32 {
    let dr = a[0] - b[0];
    let dg = a[1] - b[1];
    let db = a[2] - b[2];
    dr * dr + dg * dg + db * db
}

fn as_f32(p: &Rgb<u8>) -> [f32; 3] {
    [p.0[0] as f32, p.0[1] as f32, p.0[2] as f32]
}

fn as_rgb(c: [f32; 3]) -> Rgb<u8> {
    Rgb([
        c[0].round().clamp(0.0, 255.0) as u8,
        c[1].round().clamp(0.0, 255.0) as u8,
        c[2].round().clamp(0.0, 255.0) as u8,
    ])
}

/// Index of the reference color closest to `px` in RGB space.
pub fn nearest_color(px: [u8; 3], refs: &[[u8; 3]]) -> usize {
    let p = [px[0] as f32, px[1] as f32, px[2] as f32];
    let mut best = 0;
    let mut best_d = f32::MAX;
    for (i, r) in refs.iter().enumerate() {
        let d = dist2(p, [r[0] as f32, r[1] as f32, r[2] as f32]);
        if d < best_d {
            best_d = d;
            best = i;
        }
    }
    best
}

/// Downscale so the pixel count stays at or below `max_pixels`.
pub fn cap_pixels(img: &DynamicImage, max_pixels: u64) -> DynamicImage {
    let total = img.width() as u64 * img.height() as u64;
    if total <= max_pixels {
        return img.clone();
    }
    let scale = (max_pixels as f64 / total as f64).sqrt();
    let w = ((img.width() as f64 * scale) as u32).max(1);
    let h = ((img.height() as f64 * scale) as u32).max(1);
    log::info!("downscaling to {}x{} for clustering", w, h);
    img.resize_exact(w, h, image::imageops::FilterType::Lanczos3)
}

/// Bandwidth estimate: the `quantile`-th smallest pairwise distance among a
/// random pixel sample, floored at 0.1.
fn estimate_bandwidth(pixels: &[[f32; 3]], quantile: f32, n_samples: usize) -> f32 {
    let mut rng = rand::rng();
    let n = n_samples.min(pixels.len()).max(2);
    let sample: Vec<[f32; 3]> = (0..n)
        .map(|_| pixels[rng.random_range(0..pixels.len())])
        .collect();

    let mut dists = Vec::with_capacity(n * (n - 1) / 2);
    for i in 0..n {
        for j in (i + 1)..n {
            dists.push(dist2(sample[i], sample[j]).sqrt());
        }
    }
    dists.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let idx = ((dists.len() as f32 * quantile) as usize).min(dists.len() - 1);
    dists[idx].max(0.1)
}

/// Seed candidates: bin every pixel on a bandwidth-sized grid and keep the
/// most populous bin means.
fn bin_seeds(pixels: &[[f32; 3]], bandwidth: f32) -> Vec<[f32; 3]> {
    use std::collections::HashMap;
    let mut bins: HashMap<[i32; 3], ([f64; 3], u64)> = HashMap::new();
    for p in pixels {
        let key = [
            (p[0] / bandwidth).floor() as i32,
            (p[1] / bandwidth).floor() as i32,
            (p[2] / bandwidth).floor() as i32,
        ];
        let entry = bins.entry(key).or_insert(([0.0; 3], 0));
        for c in 0..3 {
            entry.0[c] += p[c] as f64;
        }
        entry.1 += 1;
    }
    let mut entries: Vec<([f64; 3], u64)> = bins.into_values().collect();
    entries.sort_by(|a, b| b.1.cmp(&a.1));
    entries
        .into_iter()
        .take(MAX_SEEDS)
        .map(|(sum, count)| {
            [
                (sum[0] / count as f64) as f32,
                (sum[1] / count as f64) as f32,
                (sum[2] / count as f64) as f32,
            ]
        })
        .collect()
}

/// Mean-shift color segmentation. Every pixel is replaced with the converged
/// mode nearest to it; the cluster count is the number of distinct modes.
pub fn mean_shift(img: &RgbImage, quantile: f32, n_samples: usize) -> Result<MeanShiftResult> {
    let quantile = quantile.clamp(0.01, 0.2);
    let pixels: Vec<[f32; 3]> = img.pixels().map(as_f32).collect();
    if pixels.is_empty() {
        anyhow::bail!("empty image");
    }

    let bandwidth = estimate_bandwidth(&pixels, quantile, n_samples);
    log::info!("quantile {:.2}, estimated bandwidth {:.2}", quantile, bandwidth);

    let mut rng = rand::rng();
    let population: Vec<[f32; 3]> = if pixels.len() > MODE_POPULATION {
        (0..MODE_POPULATION)
            .map(|_| pixels[rng.random_range(0..pixels.len())])
            .collect()
    } else {
        pixels.clone()
    };

    let bw2 = bandwidth * bandwidth;
    let mut modes: Vec<[f32; 3]> = Vec::new();
    for seed in bin_seeds(&pixels, bandwidth) {
        let mut center = seed;
        for _ in 0..50 {
            let mut sum = [0.0f64; 3];
            let mut count = 0u64;
            for p in &population {
                if dist2(center, *p) <= bw2 {
                    for c in 0..3 {
                        sum[c] += p[c] as f64;
                    }
                    count += 1;
                }
            }
            if count == 0 {
                break;
            }
            let next = [
                (sum[0] / count as f64) as f32,
                (sum[1] / count as f64) as f32,
                (sum[2] / count as f64) as f32,
            ];
            let moved = dist2(center, next).sqrt();
            center = next;
            if moved < 1e-3 * bandwidth {
                break;
            }
        }
        // Merge modes closer than half a bandwidth.
        let merge_d2 = (bandwidth / 2.0) * (bandwidth / 2.0);
        if !modes.iter().any(|m| dist2(*m, center) <= merge_d2) {
            modes.push(center);
        }
    }
    if modes.is_empty() {
        anyhow::bail!("mean shift produced no modes");
    }

    let mut out = RgbImage::new(img.width(), img.height());
    for (src, dst) in img.pixels().zip(out.pixels_mut()) {
        let p = as_f32(src);
        let nearest = modes
            .iter()
            .min_by(|a, b| dist2(p, **a).partial_cmp(&dist2(p, **b)).unwrap())
            .unwrap();
        *dst = as_rgb(*nearest);
    }

    Ok(MeanShiftResult {
        image: out,
        clusters: modes.len(),
        bandwidth,
    })
}

/// Lloyd's k-means in RGB space with maximin seeding: the first centroid is
/// random, each following one is the pixel farthest from all chosen so far.
pub fn kmeans(img: &RgbImage, k: usize, max_iters: usize) -> Result<KMeansResult> {
    if k == 0 {
        anyhow::bail!("k must be at least 1");
    }
    let pixels: Vec<[f32; 3]> = img.pixels().map(as_f32).collect();
    if pixels.is_empty() {
        anyhow::bail!("empty image");
    }
    let k = k.min(pixels.len());

    let mut rng = rand::rng();
    let mut centroids = vec![pixels[rng.random_range(0..pixels.len())]];
    while centroids.len() < k {
        let farthest = pixels
            .iter()
            .max_by(|a, b| {
                let da = centroids.iter().map(|c| dist2(**a, *c)).fold(f32::MAX, f32::min);
                let db = centroids.iter().map(|c| dist2(**b, *c)).fold(f32::MAX, f32::min);
                da.partial_cmp(&db).unwrap()
            })
            .unwrap();
        centroids.push(*farthest);
    }

    let mut assignment = vec![0usize; pixels.len()];
    for _ in 0..max_iters {
        for (i, p) in pixels.iter().enumerate() {
            let mut best = 0;
            let mut best_d = f32::MAX;
            for (j, c) in centroids.iter().enumerate() {
                let d = dist2(*p, *c);
                if d < best_d {
                    best_d = d;
                    best = j;
                }
            }
            assignment[i] = best;
        }

        let mut sums = vec![[0.0f64; 3]; centroids.len()];
        let mut counts = vec![0u64; centroids.len()];
        for (p, &a) in pixels.iter().zip(assignment.iter()) {
            for c in 0..3 {
                sums[a][c] += p[c] as f64;
            }
            counts[a] += 1;
        }

        let mut max_move = 0.0f32;
        for j in 0..centroids.len() {
            let next = if counts[j] == 0 {
                pixels[rng.random_range(0..pixels.len())]
            } else {
                [
                    (sums[j][0] / counts[j] as f64) as f32,
                    (sums[j][1] / counts[j] as f64) as f32,
                    (sums[j][2] / counts[j] as f64) as f32,
                ]
            };
            max_move = max_move.max(dist2(centroids[j], next).sqrt());
            centroids[j] = next;
        }
        if max_move < 0.5 {
            break;
        }
    }

    let mut out = RgbImage::new(img.width(), img.height());
    for ((_, dst), &a) in img.pixels().zip(out.pixels_mut()).zip(assignment.iter()) {
        *dst = as_rgb(centroids[a]);
    }

    Ok(KMeansResult {
        image: out,
        centroids: centroids.iter().map(|c| as_rgb(*c).0).collect(),
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Method {
    MeanShift,
    Kmeans,
}

/// CLI entry: segment one file and write the result next to it.
pub fn segment_file(
    path: &Path,
    method: Method,
    quantile: f32,
    n_samples: usize,
    k: usize,
) -> Result<PathBuf> {
    let img = output::load_image(path)?;
    let img = cap_pixels(&img, MAX_CLUSTER_PIXELS).to_rgb8();

    match method {
        Method::MeanShift => {
            let result = mean_shift(&img, quantile, n_samples)?;
            println!("{} cluster(s), bandwidth {:.2}", result.clusters, result.bandwidth);
            let out = output::sibling(path, "mean_shift", "png");
            output::save_image_with_fallback(&DynamicImage::ImageRgb8(result.image), &out)
        }
        Method::Kmeans => {
            let result = kmeans(&img, k, 25)?;
            println!("{} centroid(s)", result.centroids.len());
            let out = output::sibling(path, &format!("kmeans{}", k), "png");
            output::save_image_with_fallback(&DynamicImage::ImageRgb8(result.image), &out)
        }
    }
}
