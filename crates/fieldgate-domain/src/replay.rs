use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, HashSet, VecDeque};
use std::hash::{Hash, Hasher};
use std::sync::Mutex;

const SHARD_COUNT: usize = 16;

/// Per-device bounded set of recently observed message identifiers.
///
/// Sharded by device ID hash so validations for distinct devices rarely
/// contend. The cache is process-local and volatile: after a restart,
/// previously seen identifiers become acceptable again. That window is
/// bounded by the freshness check, since an identifier older than the skew
/// budget cannot pass validation even if the cache forgot it.
pub struct ReplayCache {
    shards: Vec<Mutex<HashMap<String, DeviceWindow>>>,
    per_device_cap: usize,
}

struct DeviceWindow {
    seen: HashSet<String>,
    order: VecDeque<String>,
}

impl DeviceWindow {
    fn new() -> Self {
        Self {
            seen: HashSet::new(),
            order: VecDeque::new(),
        }
    }
}

impl ReplayCache {
    /// Create a cache retaining at most `per_device_cap` identifiers per
    /// device. The oldest identifier is evicted once the cap is exceeded.
    pub fn new(per_device_cap: usize) -> Self {
        let shards = (0..SHARD_COUNT)
            .map(|_| Mutex::new(HashMap::new()))
            .collect();
        Self {
            shards,
            per_device_cap,
        }
    }

    /// Whether `(device_id, message_id)` has been observed.
    pub fn contains(&self, device_id: &str, message_id: &str) -> bool {
        let shard = self.shard(device_id).lock().expect("replay shard poisoned");
        shard
            .get(device_id)
            .map(|window| window.seen.contains(message_id))
            .unwrap_or(false)
    }

    /// Record `(device_id, message_id)`, evicting the device's oldest
    /// identifier if the cap is exceeded.
    pub fn insert(&self, device_id: &str, message_id: &str) {
        let mut shard = self.shard(device_id).lock().expect("replay shard poisoned");
        Self::insert_locked(
            shard.entry(device_id.to_string()).or_insert_with(DeviceWindow::new),
            message_id,
            self.per_device_cap,
        );
    }

    /// Atomic check-and-add: returns `true` and records the identifier when
    /// it was not yet observed, `false` (without mutating) on a replay hit.
    /// This is the single operation the validator uses, so two concurrent
    /// submissions of the same identifier can never both pass.
    pub fn check_and_insert(&self, device_id: &str, message_id: &str) -> bool {
        let mut shard = self.shard(device_id).lock().expect("replay shard poisoned");
        let window = shard
            .entry(device_id.to_string())
            .or_insert_with(DeviceWindow::new);
        if window.seen.contains(message_id) {
            return false;
        }
        Self::insert_locked(window, message_id, self.per_device_cap);
        true
    }

    /// Number of identifiers currently retained for a device.
    pub fn len(&self, device_id: &str) -> usize {
        let shard = self.shard(device_id).lock().expect("replay shard poisoned");
        shard.get(device_id).map(|w| w.order.len()).unwrap_or(0)
    }

    fn insert_locked(window: &mut DeviceWindow, message_id: &str, cap: usize) {
        window.seen.insert(message_id.to_string());
        window.order.push_back(message_id.to_string());
        while window.order.len() > cap {
            if let Some(oldest) = window.order.pop_front() {
                window.seen.remove(&oldest);
            }
        }
    }

    fn shard(&self, device_id: &str) -> &Mutex<HashMap<String, DeviceWindow>> {
        let mut hasher = DefaultHasher::new();
        device_id.hash(&mut hasher);
        &self.shards[(hasher.finish() as usize) % SHARD_COUNT]
    }
}
