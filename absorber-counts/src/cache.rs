//! Lazily built, shared interpolation tables.
//!
//! Each expensive quantity is tabulated once per [`CacheKey`] and reused for
//! the lifetime of the [`InterpolationCache`]. A key combines the quantity
//! tag, the fixed covariates of the query (redshift, channel width, ...) and
//! the canonical form of the model parameters.
//!
//! Every key owns a slot holding a `OnceCell`. The slot map is locked only to
//! find or insert the slot; the build itself runs with the map unlocked, so a
//! build may consult other keys (the radius table reads the profile model,
//! the count curves read the radius table) without deadlocking. Concurrent
//! first requests for the same key block on the cell and observe a single
//! build. A failed build leaves the cell empty, so the next request retries.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use halo_math::{Curve1d, Surface2d};
use once_cell::sync::OnceCell;

use crate::error::Result;
use crate::params::{canonical_bits, CanonicalParams, ModelParams};

/// Tabulated quantity held in the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Quantity {
    /// Integrated optical depth over (ln m, ln r/r_vir)
    TauProfile,
    /// Radius ratio over (ln m, ln tau)
    RadiusTau,
    /// Cumulative absorber count per redshift over ln tau
    DnDzTau,
    /// Detectable absorbers per comoving length over ln snr
    DnDr,
    /// Differential count per log tau per redshift over ln tau
    DnDlogtauDz,
    /// Absorption features per observed flux per redshift over ln s_obs
    DnDsobsDz,
    /// Per-mass optical depth variance integral over ln m
    TauVariance,
}

impl Quantity {
    pub fn name(&self) -> &'static str {
        match self {
            Quantity::TauProfile => "tau_profile",
            Quantity::RadiusTau => "radius_tau",
            Quantity::DnDzTau => "dn_dz_tau",
            Quantity::DnDr => "dn_dr",
            Quantity::DnDlogtauDz => "dn_dlogtau_dz",
            Quantity::DnDsobsDz => "dn_dsobs_dz",
            Quantity::TauVariance => "tau_variance",
        }
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Immutable identity of one table.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    quantity: Quantity,
    covariates: Vec<u64>,
    params: CanonicalParams,
    scope: u64,
}

impl CacheKey {
    /// Key for `quantity` at the given covariates under `params`.
    ///
    /// Covariates are compared bitwise, with `-0.0` folded onto `0.0`.
    pub fn new(quantity: Quantity, covariates: &[f64], params: &ModelParams) -> Self {
        Self {
            quantity,
            covariates: covariates.iter().map(|&c| canonical_bits(c)).collect(),
            params: params.canonical(),
            scope: 0,
        }
    }

    /// Separate this key from keys built under other table settings.
    pub fn with_scope(mut self, scope: u64) -> Self {
        self.scope = scope;
        self
    }

    pub fn quantity(&self) -> Quantity {
        self.quantity
    }

    /// Covariates as floating point values, in the order given.
    pub fn covariates(&self) -> Vec<f64> {
        self.covariates.iter().map(|&bits| f64::from_bits(bits)).collect()
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{:?}", self.quantity, self.covariates())?;
        for (name, value) in self.params.entries() {
            write!(f, " {name}={value:?}")?;
        }
        Ok(())
    }
}

type Slot<T> = Arc<OnceCell<Arc<T>>>;

/// Map from key to build-once slot.
struct SlotMap<T> {
    slots: Mutex<HashMap<CacheKey, Slot<T>>>,
}

impl<T> Default for SlotMap<T> {
    fn default() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
        }
    }
}

impl<T> SlotMap<T> {
    fn lock(&self) -> MutexGuard<'_, HashMap<CacheKey, Slot<T>>> {
        // A panicking builder cannot leave a half-written table: the cell is
        // only populated on success.
        self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn slot(&self, key: &CacheKey) -> Slot<T> {
        self.lock().entry(key.clone()).or_default().clone()
    }

    fn get(&self, key: &CacheKey) -> Option<Arc<T>> {
        self.lock().get(key).and_then(|slot| slot.get().cloned())
    }

    fn replace(&self, key: &CacheKey, table: Arc<T>) {
        self.lock()
            .insert(key.clone(), Arc::new(OnceCell::with_value(table)));
    }

    fn populated(&self) -> usize {
        self.lock().values().filter(|slot| slot.get().is_some()).count()
    }

    fn clear(&self) {
        self.lock().clear();
    }
}

/// Session-wide store of fitted tables.
///
/// Shared between models (and threads) through an `Arc`.
#[derive(Default)]
pub struct InterpolationCache {
    surfaces: SlotMap<Surface2d>,
    curves: SlotMap<Curve1d>,
    builds: AtomicUsize,
}

impl fmt::Debug for InterpolationCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterpolationCache")
            .field("surfaces", &self.surfaces.populated())
            .field("curves", &self.curves.populated())
            .field("builds", &self.build_count())
            .finish()
    }
}

impl InterpolationCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Surface for `key`, built with `build` on first request.
    pub fn surface<F>(&self, key: &CacheKey, build: F) -> Result<Arc<Surface2d>>
    where
        F: FnOnce() -> Result<Surface2d>,
    {
        let slot = self.surfaces.slot(key);
        slot.get_or_try_init(|| self.timed_build(key, build).map(Arc::new))
            .cloned()
    }

    /// Curve for `key`, built with `build` on first request.
    pub fn curve<F>(&self, key: &CacheKey, build: F) -> Result<Arc<Curve1d>>
    where
        F: FnOnce() -> Result<Curve1d>,
    {
        let slot = self.curves.slot(key);
        slot.get_or_try_init(|| self.timed_build(key, build).map(Arc::new))
            .cloned()
    }

    /// Build a new surface for `key` and replace any existing one.
    pub fn rebuild_surface<F>(&self, key: &CacheKey, build: F) -> Result<Arc<Surface2d>>
    where
        F: FnOnce() -> Result<Surface2d>,
    {
        log::info!("Rebuilding {key}");
        let table = Arc::new(self.timed_build(key, build)?);
        self.surfaces.replace(key, table.clone());
        Ok(table)
    }

    /// Build a new curve for `key` and replace any existing one.
    pub fn rebuild_curve<F>(&self, key: &CacheKey, build: F) -> Result<Arc<Curve1d>>
    where
        F: FnOnce() -> Result<Curve1d>,
    {
        log::info!("Rebuilding {key}");
        let table = Arc::new(self.timed_build(key, build)?);
        self.curves.replace(key, table.clone());
        Ok(table)
    }

    /// Already built curve, without building.
    pub fn cached_curve(&self, key: &CacheKey) -> Option<Arc<Curve1d>> {
        self.curves.get(key)
    }

    /// Number of successful table builds since creation, rebuilds included.
    pub fn build_count(&self) -> usize {
        self.builds.load(Ordering::SeqCst)
    }

    /// Number of tables currently held.
    pub fn len(&self) -> usize {
        self.surfaces.populated() + self.curves.populated()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every table. The build counter is kept.
    pub fn clear(&self) {
        self.surfaces.clear();
        self.curves.clear();
    }

    fn timed_build<T, F>(&self, key: &CacheKey, build: F) -> Result<T>
    where
        F: FnOnce() -> Result<T>,
    {
        log::debug!("Building {key}");
        let start = Instant::now();
        let table = build()?;
        self.builds.fetch_add(1, Ordering::SeqCst);
        log::info!(
            "Built {key} in {:.3}ms",
            start.elapsed().as_secs_f64() * 1000.0
        );
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AbsorberError;
    use std::sync::atomic::AtomicUsize;

    fn line() -> Result<Curve1d> {
        Ok(Curve1d::fit(vec![0.0, 1.0, 2.0], vec![1.0, 2.0, 3.0])?)
    }

    #[test]
    fn test_build_once() {
        let cache = InterpolationCache::new();
        let key = CacheKey::new(Quantity::DnDzTau, &[1.0], &ModelParams::new());

        let first = cache.curve(&key, line).unwrap();
        let second = cache
            .curve(&key, || panic!("table should not be rebuilt"))
            .unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.build_count(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_keys_separate_covariates_and_quantities() {
        let cache = InterpolationCache::new();
        let params = ModelParams::new();
        cache
            .curve(&CacheKey::new(Quantity::DnDzTau, &[1.0], &params), line)
            .unwrap();
        cache
            .curve(&CacheKey::new(Quantity::DnDzTau, &[2.0], &params), line)
            .unwrap();
        cache
            .curve(&CacheKey::new(Quantity::DnDr, &[1.0], &params), line)
            .unwrap();
        assert_eq!(cache.build_count(), 3);
    }

    #[test]
    fn test_insertion_order_shares_entry() {
        let a = ModelParams::new().with("x", 1.0).with("y", "b");
        let b = ModelParams::new().with("y", "b").with("x", 1.0);
        assert_eq!(
            CacheKey::new(Quantity::RadiusTau, &[0.5], &a),
            CacheKey::new(Quantity::RadiusTau, &[0.5], &b)
        );
    }

    #[test]
    fn test_failed_build_leaves_slot_empty() {
        let cache = InterpolationCache::new();
        let key = CacheKey::new(Quantity::DnDr, &[0.1, 1e4], &ModelParams::new());

        let failed = cache.curve(&key, || {
            Err(AbsorberError::InvalidParameter {
                name: "test".into(),
                reason: "forced".into(),
            })
        });
        assert!(failed.is_err());
        assert!(cache.cached_curve(&key).is_none());
        assert_eq!(cache.build_count(), 0);

        cache.curve(&key, line).unwrap();
        assert_eq!(cache.build_count(), 1);
    }

    #[test]
    fn test_rebuild_replaces() {
        let cache = InterpolationCache::new();
        let key = CacheKey::new(Quantity::DnDzTau, &[1.0], &ModelParams::new());
        let first = cache.curve(&key, line).unwrap();
        let rebuilt = cache.rebuild_curve(&key, line).unwrap();

        assert!(!Arc::ptr_eq(&first, &rebuilt));
        let current = cache.cached_curve(&key).unwrap();
        assert!(Arc::ptr_eq(&current, &rebuilt));
        assert_eq!(cache.build_count(), 2);
    }

    #[test]
    fn test_concurrent_first_access_builds_once() {
        let cache = InterpolationCache::new();
        let key = CacheKey::new(Quantity::DnDzTau, &[0.3], &ModelParams::new());
        let calls = AtomicUsize::new(0);

        std::thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| {
                    cache
                        .curve(&key, || {
                            calls.fetch_add(1, Ordering::SeqCst);
                            std::thread::sleep(std::time::Duration::from_millis(20));
                            line()
                        })
                        .unwrap();
                });
            }
        });

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.build_count(), 1);
    }

    #[test]
    fn test_nested_build_does_not_deadlock() {
        let cache = InterpolationCache::new();
        let params = ModelParams::new();
        let outer = CacheKey::new(Quantity::DnDzTau, &[1.0], &params);
        let inner = CacheKey::new(Quantity::RadiusTau, &[1.0], &params);

        cache
            .curve(&outer, || {
                cache.curve(&inner, line)?;
                line()
            })
            .unwrap();
        assert_eq!(cache.build_count(), 2);
    }

    #[test]
    fn test_scope_separates_keys() {
        let params = ModelParams::new();
        let a = CacheKey::new(Quantity::DnDr, &[1.0], &params);
        let b = a.clone().with_scope(7);
        assert_ne!(a, b);
        assert_eq!(a.to_string(), b.to_string());
    }

    #[test]
    fn test_display_names_quantity() {
        let key = CacheKey::new(
            Quantity::TauProfile,
            &[0.5],
            &ModelParams::new().with("profile_model", "exponential"),
        );
        let text = key.to_string();
        assert!(text.starts_with("tau_profile[0.5]"));
        assert!(text.contains("profile_model"));
    }
}
