/*
 *  slideshow.rs
 *
 *  MirrorBoard - worth the squeeze
 *	(c) 2020-26 Stuart Hunter
 *
 *	Background slideshow - remote random images with a shuffled local fallback
 *
 *	This program is free software: you can redistribute it and/or modify
 *	it under the terms of the GNU General Public License as published by
 *	the Free Software Foundation, either version 3 of the License, or
 *	(at your option) any later version.
 *
 *	This program is distributed in the hope that it will be useful,
 *	but WITHOUT ANY WARRANTY; without even the implied warranty of
 *	MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *	GNU General Public License for more details.
 *
 *	See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *	Public License.
 *
 */
use log::{debug, error, info, warn};
use rand::Rng;
use rand::seq::SliceRandom;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::constants::SLIDE_PRUNE_DELAY;
use crate::display::factory::SharedSurface;
use crate::image_loader::{cache_busted, CrossOrigin, ImageLoader};

/// Shuffled copy of the fallback list (Fisher-Yates)
pub fn shuffled<R: Rng + ?Sized>(images: &[String], rng: &mut R) -> Vec<String> {
    let mut list = images.to_vec();
    list.shuffle(rng);
    list
}

#[derive(Debug, Clone)]
pub struct SlideshowState {
    /// one-way: flips to false on the first remote failure
    pub using_remote: bool,
    pub fallback_index: usize,
    pub fallback: Vec<String>,
}

impl SlideshowState {
    pub fn new(remote: bool, fallback: Vec<String>) -> Self {
        Self { using_remote: remote, fallback_index: 0, fallback }
    }

    /// Next local image, advancing and wrapping the index
    fn next_local(&mut self) -> Option<String> {
        if self.fallback.is_empty() {
            return None;
        }
        let url = self.fallback[self.fallback_index % self.fallback.len()].clone();
        self.fallback_index = (self.fallback_index + 1) % self.fallback.len();
        Some(url)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SlideOutcome {
    Remote(String),
    Local(String),
    /// nothing loadable this cycle
    Skipped,
    /// previous cycle still loading
    Busy,
    /// surface has no slideshow layer
    Disabled,
}

/// Clears the in-flight flag however the cycle ends
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct Slideshow {
    loader: Arc<dyn ImageLoader>,
    remote_url: Option<String>,
    state: Mutex<SlideshowState>,
    in_flight: AtomicBool,
    prune_delay: Duration,
}

impl Slideshow {
    /// `remote_url: None` starts in local mode
    pub fn new(loader: Arc<dyn ImageLoader>, remote_url: Option<String>, fallback: &[String]) -> Self {
        Self::with_rng(loader, remote_url, fallback, &mut rand::rng())
    }

    pub fn with_rng<R: Rng + ?Sized>(
        loader: Arc<dyn ImageLoader>,
        remote_url: Option<String>,
        fallback: &[String],
        rng: &mut R,
    ) -> Self {
        let list = shuffled(fallback, rng);
        debug!("Fallback order: {:?}", list);
        Self {
            loader,
            state: Mutex::new(SlideshowState::new(remote_url.is_some(), list)),
            remote_url,
            in_flight: AtomicBool::new(false),
            prune_delay: SLIDE_PRUNE_DELAY,
        }
    }

    pub fn state(&self) -> SlideshowState {
        self.lock_state().clone()
    }

    pub fn using_remote(&self) -> bool {
        self.lock_state().using_remote
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, SlideshowState> {
        // state is only ever mutated by plain assignments, a poisoned lock is still consistent
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn try_remote(&self, base: &str) -> Option<String> {
        let url = cache_busted(base);
        info!("Loading image from {}", url);
        match self.loader.load(&url, CrossOrigin::Anonymous).await {
            Ok(()) => return Some(url),
            Err(e) => warn!("Remote image failed with cross-origin ({}), retrying without", e),
        }
        match self.loader.load(&url, CrossOrigin::None).await {
            Ok(()) => Some(url),
            Err(e) => {
                warn!("Remote image failed, switching to fallback images: {}", e);
                None
            }
        }
    }

    /// One bounded pass over the local list, starting at the current index
    async fn try_local(&self) -> Option<String> {
        let attempts = self.lock_state().fallback.len();
        for _ in 0..attempts {
            let Some(url) = self.lock_state().next_local() else { break };
            debug!("Loading fallback image {}", url);
            match self.loader.load(&url, CrossOrigin::None).await {
                Ok(()) => return Some(url),
                Err(e) => warn!("Fallback image {} failed, trying next: {}", url, e),
            }
        }
        None
    }

    /// Advance the slideshow by one image
    pub async fn show_next(&self, surface: &SharedSurface) -> SlideOutcome {
        if !surface.lock().await.capabilities().slideshow {
            return SlideOutcome::Disabled;
        }
        if self.in_flight.swap(true, Ordering::AcqRel) {
            debug!("Slide still loading, tick skipped");
            return SlideOutcome::Busy;
        }
        let _guard = InFlight(&self.in_flight);

        let remote = match (&self.remote_url, self.using_remote()) {
            (Some(base), true) => Some(base.clone()),
            _ => None,
        };
        if let Some(base) = remote {
            if let Some(url) = self.try_remote(&base).await {
                self.display(surface, &url).await;
                return SlideOutcome::Remote(url);
            }
            self.lock_state().using_remote = false;
        }

        match self.try_local().await {
            Some(url) => {
                self.display(surface, &url).await;
                SlideOutcome::Local(url)
            }
            None => {
                error!("No loadable slide, keeping the current background");
                SlideOutcome::Skipped
            }
        }
    }

    /// Stack the new layer on top, prune the older ones once the fade is over
    async fn display(&self, surface: &SharedSurface, url: &str) {
        let id = {
            let mut surface = surface.lock().await;
            match surface.push_slide(url).and_then(|id| surface.flush().map(|_| id)) {
                Ok(id) => id,
                Err(e) => {
                    error!("Slide transition failed: {}", e);
                    return;
                }
            }
        };

        let surface = Arc::clone(surface);
        let delay = self.prune_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let mut surface = surface.lock().await;
            match surface.prune_slides(id).and_then(|n| surface.flush().map(|_| n)) {
                Ok(n) => debug!("Pruned {} slide layer(s)", n),
                Err(e) => error!("Slide prune failed: {}", e),
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::drivers::memory::MemoryDriver;
    use crate::display::factory::share;
    use crate::display::traits::SurfaceCapabilities;
    use crate::image_loader::ImageLoadError;
    use async_trait::async_trait;
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::collections::HashSet;

    #[derive(Default)]
    struct FakeLoader {
        remote_ok: bool,
        broken: HashSet<String>,
        delay: Duration,
        calls: Mutex<Vec<(String, CrossOrigin)>>,
    }

    #[async_trait]
    impl ImageLoader for FakeLoader {
        async fn load(&self, url: &str, cross_origin: CrossOrigin) -> Result<(), ImageLoadError> {
            self.calls.lock().unwrap().push((url.to_string(), cross_origin));
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            let ok = if url.starts_with("http") { self.remote_ok } else { !self.broken.contains(url) };
            if ok { Ok(()) } else { Err(ImageLoadError::Status(404)) }
        }
    }

    fn images(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("Wallpaper/{i}.jpg")).collect()
    }

    fn remote_calls(loader: &FakeLoader) -> usize {
        loader.calls.lock().unwrap().iter().filter(|(u, _)| u.starts_with("http")).count()
    }

    proptest! {
        #[test]
        fn shuffle_is_permutation(list in prop::collection::vec("[a-z]{1,8}", 0..24), seed in any::<u64>()) {
            let mut rng = StdRng::seed_from_u64(seed);
            let mut out = shuffled(&list, &mut rng);
            let mut expected = list.clone();
            out.sort();
            expected.sort();
            prop_assert_eq!(out, expected);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_remote_success_stays_remote() {
        let loader = Arc::new(FakeLoader { remote_ok: true, ..Default::default() });
        let show = Slideshow::new(loader.clone(), Some("https://picsum.photos/1920/1080".into()), &images(3));
        let surface = share(Box::new(MemoryDriver::full()));

        let outcome = show.show_next(&surface).await;
        assert!(matches!(outcome, SlideOutcome::Remote(ref u) if u.contains("?random=")));
        assert!(show.using_remote());
        assert_eq!(loader.calls.lock().unwrap()[0].1, CrossOrigin::Anonymous);
    }

    #[tokio::test(start_paused = true)]
    async fn test_remote_failure_switches_to_local_for_good() {
        let loader = Arc::new(FakeLoader::default());
        let show = Slideshow::new(loader.clone(), Some("https://picsum.photos/1920/1080".into()), &images(3));
        let surface = share(Box::new(MemoryDriver::full()));

        let outcome = show.show_next(&surface).await;
        assert!(matches!(outcome, SlideOutcome::Local(_)));
        assert!(!show.using_remote());
        // cross-origin attempt, then the plain retry
        let calls = loader.calls.lock().unwrap().clone();
        assert_eq!(calls[0].1, CrossOrigin::Anonymous);
        assert_eq!(calls[1].1, CrossOrigin::None);
        assert_eq!(calls[0].0, calls[1].0);

        for _ in 0..5 {
            assert!(matches!(show.show_next(&surface).await, SlideOutcome::Local(_)));
        }
        assert_eq!(remote_calls(&loader), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_local_rotation_wraps() {
        let loader = Arc::new(FakeLoader::default());
        let show = Slideshow::new(loader, None, &images(3));
        let order = show.state().fallback;
        let surface = share(Box::new(MemoryDriver::full()));

        let mut seen = Vec::new();
        for _ in 0..4 {
            if let SlideOutcome::Local(url) = show.show_next(&surface).await {
                seen.push(url);
            }
        }
        assert_eq!(seen[..3], order[..]);
        assert_eq!(seen[3], order[0]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_local_pass_skips_broken_and_gives_up() {
        let list = images(3);
        let broken: HashSet<String> = list.iter().cloned().collect();
        let loader = Arc::new(FakeLoader { broken, ..Default::default() });
        let show = Slideshow::new(loader.clone(), None, &list);
        let surface = share(Box::new(MemoryDriver::full()));

        assert_eq!(show.show_next(&surface).await, SlideOutcome::Skipped);
        assert_eq!(loader.calls.lock().unwrap().len(), 3);
        // the failed pass does not move the starting point
        assert_eq!(show.state().fallback_index, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_one_broken_image_is_skipped() {
        let list = images(2);
        let mut rng = StdRng::seed_from_u64(7);
        let order = shuffled(&list, &mut StdRng::seed_from_u64(7));
        let broken: HashSet<String> = [order[0].clone()].into_iter().collect();
        let loader = Arc::new(FakeLoader { broken, ..Default::default() });
        let show = Slideshow::with_rng(loader, None, &list, &mut rng);
        let surface = share(Box::new(MemoryDriver::full()));

        assert_eq!(show.show_next(&surface).await, SlideOutcome::Local(order[1].clone()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_fallback_list() {
        let loader = Arc::new(FakeLoader::default());
        let show = Slideshow::new(loader, None, &[]);
        let surface = share(Box::new(MemoryDriver::full()));
        assert_eq!(show.show_next(&surface).await, SlideOutcome::Skipped);
    }

    #[tokio::test(start_paused = true)]
    async fn test_prune_leaves_single_visible_layer() {
        let loader = Arc::new(FakeLoader::default());
        let show = Slideshow::new(loader, None, &images(3));
        let driver = MemoryDriver::full();
        let state = driver.state();
        let surface = share(Box::new(driver));

        show.show_next(&surface).await;
        show.show_next(&surface).await;
        assert_eq!(state.lock().unwrap().slides.len(), 2);
        assert_eq!(state.lock().unwrap().visible_slides().len(), 1);

        tokio::time::sleep(SLIDE_PRUNE_DELAY + Duration::from_millis(10)).await;
        let state = state.lock().unwrap();
        assert_eq!(state.slides.len(), 1);
        assert!(state.slides[0].visible);
    }

    #[tokio::test(start_paused = true)]
    async fn test_overlapping_tick_is_busy() {
        let loader = Arc::new(FakeLoader { delay: Duration::from_secs(5), ..Default::default() });
        let show = Slideshow::new(loader.clone(), None, &images(2));
        let surface = share(Box::new(MemoryDriver::full()));

        let (first, second) = tokio::join!(show.show_next(&surface), show.show_next(&surface));
        assert!(matches!(first, SlideOutcome::Local(_)));
        assert_eq!(second, SlideOutcome::Busy);
        assert_eq!(loader.calls.lock().unwrap().len(), 1);

        // guard is released once the load completes
        assert!(matches!(show.show_next(&surface).await, SlideOutcome::Local(_)));
    }

    #[tokio::test]
    async fn test_surface_without_slideshow() {
        let loader = Arc::new(FakeLoader::default());
        let show = Slideshow::new(loader, None, &images(1));
        let caps = SurfaceCapabilities { slots: vec![], widgets: vec![], slideshow: false };
        let surface = share(Box::new(MemoryDriver::new(caps)));
        assert_eq!(show.show_next(&surface).await, SlideOutcome::Disabled);
    }
}
