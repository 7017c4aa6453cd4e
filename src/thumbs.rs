use eframe::egui;
use std::collections::{HashMap, HashSet, VecDeque};
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use std::thread;
use crossbeam_channel::{Receiver, Sender, unbounded};
use fast_image_resize::images::Image as FastImage;
use fast_image_resize::{PixelType, ResizeOptions, Resizer};

/// Cache key: which file, decoded at which target size.
pub type ThumbKey = (PathBuf, (u32, u32));

/// Completion delivered to the UI loop. Never handed out synchronously from
/// `request`; cache hits are queued and surface on the next `poll`, so a
/// caller that released a row in between can safely ignore the result.
#[derive(Clone)]
pub enum ThumbEvent {
    Loaded(ThumbKey, Arc<egui::ColorImage>),
    Failed(ThumbKey),
}

impl ThumbEvent {
    pub fn key(&self) -> &ThumbKey {
        match self {
            ThumbEvent::Loaded(k, _) => k,
            ThumbEvent::Failed(k) => k,
        }
    }
}

enum WorkerOutcome {
    Decoded(egui::ColorImage),
    Failed,
    // Key was no longer in the active window when the worker picked the job
    // up. Not a failure; requeued if the key became wanted again.
    Skipped,
}

/// Bounded store of decoded thumbnails with batch-FIFO eviction.
///
/// Eviction drops the oldest ~10% of entries (by insertion order, not
/// recency) whenever an insert would exceed capacity. This is intentionally
/// not LRU: thumbnail access tracks scroll locality, so exact recency
/// bookkeeping buys nothing over the O(1) amortized batch drop.
pub struct ThumbnailCache {
    capacity: usize,
    map: HashMap<ThumbKey, Arc<egui::ColorImage>>,
    order: VecDeque<ThumbKey>,
}

impl ThumbnailCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            map: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    pub fn get(&self, key: &ThumbKey) -> Option<Arc<egui::ColorImage>> {
        self.map.get(key).cloned()
    }

    pub fn insert(&mut self, key: ThumbKey, image: Arc<egui::ColorImage>) {
        if self.map.insert(key.clone(), image).is_some() {
            // Same key decoded twice: last writer wins, insertion slot kept.
            return;
        }
        self.order.push_back(key);
        if self.map.len() > self.capacity {
            self.evict_batch();
        }
    }

    fn evict_batch(&mut self) {
        let batch = (self.capacity / 10).max(1);
        let mut dropped = 0;
        while dropped < batch {
            match self.order.pop_front() {
                Some(old) => {
                    if self.map.remove(&old).is_some() {
                        dropped += 1;
                    }
                }
                None => break,
            }
        }
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn contains(&self, key: &ThumbKey) -> bool {
        self.map.contains_key(key)
    }
}

/// Background decode pipeline: a fixed worker pool decodes files into
/// fixed-size thumbnails and hands them back over a channel drained by the
/// UI loop. Workers consult a shared active-window set before decoding and
/// skip keys nobody wants anymore.
pub struct ThumbnailLoader {
    job_tx: Sender<ThumbKey>,
    result_rx: Receiver<(ThumbKey, WorkerOutcome)>,
    active: Arc<RwLock<HashSet<ThumbKey>>>,
    // Keys queued or in flight; suppresses duplicate decodes for one key.
    pending: HashSet<ThumbKey>,
    // Cache hits waiting to be surfaced on the next poll.
    ready: VecDeque<ThumbEvent>,
    cache: ThumbnailCache,
}

impl ThumbnailLoader {
    pub fn new(cache_capacity: usize, workers: usize) -> Self {
        let (job_tx, job_rx) = unbounded::<ThumbKey>();
        let (result_tx, result_rx) = unbounded();
        let active: Arc<RwLock<HashSet<ThumbKey>>> = Arc::new(RwLock::new(HashSet::new()));

        let num_threads = workers
            .max(1)
            .min(thread::available_parallelism().map(|n| n.get()).unwrap_or(4))
            .min(8);

        for _ in 0..num_threads {
            let rx = job_rx.clone();
            let tx = result_tx.clone();
            let window = active.clone();

            thread::spawn(move || {
                while let Ok(key) = rx.recv() {
                    let wanted = window.read().map(|w| w.contains(&key)).unwrap_or(false);
                    if !wanted {
                        let _ = tx.send((key, WorkerOutcome::Skipped));
                        continue;
                    }
                    let outcome = match decode_thumbnail(&key.0, key.1) {
                        Some(img) => WorkerOutcome::Decoded(img),
                        None => WorkerOutcome::Failed,
                    };
                    let _ = tx.send((key, outcome));
                }
            });
        }

        Self {
            job_tx,
            result_rx,
            active,
            pending: HashSet::new(),
            ready: VecDeque::new(),
            cache: ThumbnailCache::new(cache_capacity),
        }
    }

    /// Ask for the thumbnail of `path` at `size`. Always asynchronous: a
    /// cache hit is queued and reported by the next `poll`, a miss goes to
    /// the worker pool. Duplicate requests for a key already in flight are
    /// coalesced.
    pub fn request(&mut self, path: PathBuf, size: (u32, u32)) {
        let key = (path, size);
        if let Some(img) = self.cache.get(&key) {
            self.ready.push_back(ThumbEvent::Loaded(key, img));
            return;
        }
        // Re-arm the active window before the duplicate check: a key that
        // was released and re-requested while its job is still queued must
        // look wanted again, or the worker's Skipped report would clear the
        // pending entry and the request would be lost.
        if let Ok(mut w) = self.active.write() {
            w.insert(key.clone());
        }
        if !self.pending.insert(key.clone()) {
            return;
        }
        let _ = self.job_tx.send(key);
    }

    /// Withdraw interest in a key: in-flight decodes for it will be skipped
    /// by the workers and their eventual completions dropped. Called when
    /// the requesting row is dematerialized.
    pub fn release(&mut self, key: &ThumbKey) {
        if let Ok(mut w) = self.active.write() {
            w.remove(key);
        }
    }

    /// Drain completed work. Decoded images are inserted into the cache
    /// before being reported; failures are reported and not cached, so a
    /// later re-materialization of the row retries the decode.
    pub fn poll(&mut self) -> Vec<ThumbEvent> {
        let mut events: Vec<ThumbEvent> = self.ready.drain(..).collect();

        while let Ok((key, outcome)) = self.result_rx.try_recv() {
            match outcome {
                WorkerOutcome::Decoded(img) => {
                    self.pending.remove(&key);
                    let img = Arc::new(img);
                    self.cache.insert(key.clone(), img.clone());
                    events.push(ThumbEvent::Loaded(key, img));
                }
                WorkerOutcome::Failed => {
                    self.pending.remove(&key);
                    events.push(ThumbEvent::Failed(key));
                }
                WorkerOutcome::Skipped => {
                    let still_wanted =
                        self.active.read().map(|w| w.contains(&key)).unwrap_or(false);
                    if still_wanted {
                        // Interest came back before the skip drained; requeue.
                        let _ = self.job_tx.send(key);
                    } else {
                        self.pending.remove(&key);
                    }
                }
            }
        }
        events
    }

    pub fn cache(&self) -> &ThumbnailCache {
        &self.cache
    }

    pub fn is_pending(&self, key: &ThumbKey) -> bool {
        self.pending.contains(key)
    }
}

/// Decode `path` and downscale it to fit within `size`. Any failure (missing
/// file, corrupt data, unsupported format) collapses to `None`; nothing
/// crosses the thread boundary as a panic.
fn decode_thumbnail(path: &std::path::Path, size: (u32, u32)) -> Option<egui::ColorImage> {
    let bytes = fs::read(path).ok()?;

    let mut reader = image::ImageReader::new(std::io::Cursor::new(&bytes))
        .with_guessed_format()
        .unwrap_or_else(|_| image::ImageReader::new(std::io::Cursor::new(&bytes)));

    // Fall back to the file extension when magic bytes are inconclusive.
    if reader.format().is_none() {
        if let Ok(fmt) = image::ImageFormat::from_path(path) {
            reader.set_format(fmt);
        }
    }

    let dyn_img = reader.decode().ok()?;
    let (w, h) = (dyn_img.width(), dyn_img.height());
    if w == 0 || h == 0 {
        return None;
    }
    let buf = dyn_img.to_rgba8();

    let (max_w, max_h) = (size.0.max(1), size.1.max(1));
    if w <= max_w && h <= max_h {
        let pixels = buf.as_flat_samples();
        return Some(egui::ColorImage::from_rgba_unmultiplied(
            [w as usize, h as usize],
            pixels.as_slice(),
        ));
    }

    let scale = (max_w as f32 / w as f32).min(max_h as f32 / h as f32);
    let new_w = ((w as f32 * scale).round() as u32).max(1);
    let new_h = ((h as f32 * scale).round() as u32).max(1);

    let src = FastImage::from_vec_u8(w, h, buf.into_raw(), PixelType::U8x4).ok()?;
    let mut dst = FastImage::new(new_w, new_h, PixelType::U8x4);

    let mut resizer = Resizer::new();
    resizer.resize(&src, &mut dst, &ResizeOptions::default()).ok()?;

    Some(egui::ColorImage::from_rgba_unmultiplied(
        [new_w as usize, new_h as usize],
        dst.buffer(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    fn dummy_image() -> Arc<egui::ColorImage> {
        Arc::new(egui::ColorImage::example())
    }

    fn key(n: usize) -> ThumbKey {
        (PathBuf::from(format!("/img/{n}.jpg")), (64, 64))
    }

    #[test]
    fn test_cache_never_exceeds_capacity() {
        let mut cache = ThumbnailCache::new(20);
        for i in 0..200 {
            cache.insert(key(i), dummy_image());
            assert!(cache.len() <= 20, "cache grew to {}", cache.len());
        }
    }

    #[test]
    fn test_cache_evicts_oldest_batch() {
        let mut cache = ThumbnailCache::new(10);
        for i in 0..11 {
            cache.insert(key(i), dummy_image());
        }
        // Capacity 10, batch = 1: the very first insert is gone, latest kept.
        assert!(!cache.contains(&key(0)));
        assert!(cache.contains(&key(10)));
        assert_eq!(cache.len(), 10);
    }

    #[test]
    fn test_cache_same_key_overwrites_in_place() {
        let mut cache = ThumbnailCache::new(5);
        cache.insert(key(1), dummy_image());
        cache.insert(key(1), dummy_image());
        assert_eq!(cache.len(), 1);
    }

    fn poll_until(loader: &mut ThumbnailLoader, deadline: Duration) -> Vec<ThumbEvent> {
        let start = Instant::now();
        loop {
            let events = loader.poll();
            if !events.is_empty() {
                return events;
            }
            if start.elapsed() > deadline {
                return Vec::new();
            }
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn test_missing_file_reports_failure_and_caches_nothing() {
        let mut loader = ThumbnailLoader::new(16, 2);
        let path = PathBuf::from("/nonexistent/picalog-test/missing.jpg");
        loader.request(path.clone(), (64, 64));

        let events = poll_until(&mut loader, Duration::from_secs(5));
        assert_eq!(events.len(), 1);
        match &events[0] {
            ThumbEvent::Failed(k) => assert_eq!(k.0, path),
            ThumbEvent::Loaded(..) => panic!("missing file must not decode"),
        }
        assert!(loader.cache().is_empty());
        assert!(!loader.is_pending(&(path, (64, 64))));
    }

    #[test]
    fn test_decode_and_cache_hit_are_both_deferred() {
        let dir = std::env::temp_dir().join(format!("picalog-thumbs-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("tiny.png");
        image::RgbaImage::from_pixel(8, 8, image::Rgba([10, 20, 30, 255]))
            .save(&path)
            .unwrap();

        let mut loader = ThumbnailLoader::new(16, 2);
        loader.request(path.clone(), (64, 64));
        // Asynchronous contract: nothing is handed out inline.
        // (The worker may be fast, but the first observation goes via poll.)
        let events = poll_until(&mut loader, Duration::from_secs(5));
        assert!(matches!(events[0], ThumbEvent::Loaded(..)));
        assert_eq!(loader.cache().len(), 1);

        // Second request hits the cache but still arrives via poll.
        loader.request(path.clone(), (64, 64));
        let events = loader.poll();
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], ThumbEvent::Loaded(..)));

        let _ = fs::remove_file(&path);
        let _ = fs::remove_dir(&dir);
    }

    #[test]
    fn test_duplicate_requests_coalesce() {
        let mut loader = ThumbnailLoader::new(16, 1);
        let path = PathBuf::from("/nonexistent/picalog-test/dup.jpg");
        loader.request(path.clone(), (64, 64));
        loader.request(path.clone(), (64, 64));

        let mut failures = 0;
        let start = Instant::now();
        while start.elapsed() < Duration::from_secs(5) {
            for ev in loader.poll() {
                if matches!(ev, ThumbEvent::Failed(_)) {
                    failures += 1;
                }
            }
            if failures > 0 && loader.poll().is_empty() {
                break;
            }
            thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(failures, 1);
    }

    #[test]
    fn test_rerequest_after_release_still_completes() {
        // Keep the single worker busy on a real decode so the second key
        // stays queued while interest is withdrawn and re-declared. The
        // re-request must still produce a completion.
        let dir = std::env::temp_dir().join(format!("picalog-rereq-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let slow = dir.join("big.png");
        image::RgbaImage::from_pixel(3000, 3000, image::Rgba([80, 80, 80, 255]))
            .save(&slow)
            .unwrap();

        let mut loader = ThumbnailLoader::new(16, 1);
        loader.request(slow.clone(), (64, 64));

        let path = PathBuf::from("/nonexistent/picalog-test/rereq.jpg");
        let k = (path.clone(), (64u32, 64u32));
        loader.request(path.clone(), (64, 64));
        loader.release(&k);
        loader.request(path, (64, 64));

        let mut got_failure = false;
        let start = Instant::now();
        while start.elapsed() < Duration::from_secs(10) {
            for ev in loader.poll() {
                if matches!(&ev, ThumbEvent::Failed(key) if *key == k) {
                    got_failure = true;
                }
            }
            if got_failure {
                break;
            }
            thread::sleep(Duration::from_millis(5));
        }
        assert!(got_failure, "re-requested key never completed");

        let _ = fs::remove_file(&slow);
        let _ = fs::remove_dir(&dir);
    }

    #[test]
    fn test_released_key_is_skipped_silently() {
        let mut loader = ThumbnailLoader::new(16, 1);
        let path = PathBuf::from("/nonexistent/picalog-test/released.jpg");
        let k = (path.clone(), (64u32, 64u32));
        loader.request(path, (64, 64));
        loader.release(&k);

        // The worker either skipped the job (no event) or raced the release
        // and reported a failure; either way nothing lands in the cache and
        // pending eventually clears.
        let start = Instant::now();
        while loader.is_pending(&k) && start.elapsed() < Duration::from_secs(5) {
            let _ = loader.poll();
            thread::sleep(Duration::from_millis(5));
        }
        assert!(loader.cache().is_empty());
    }
}
