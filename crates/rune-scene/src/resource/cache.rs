use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

use engine_core::{DecodeError, DecodedImage, ImageCrateDecoder, ImageDecoder, ImageSource, TextureHandle};
use hashbrown::HashMap;
use rune_config::RuneConfig;
use rune_text::FontBackend;
use tracing::{debug, trace, warn};

use crate::resource::listeners::{Callback, ListenerOwner, ListenerToken, Listeners};
use crate::resource::loader::{CancelFlag, Completion, FontSource, Job, Loader, Payload};
use crate::resource::{
    FontKey, ImageRequest, ResourceEvent, ResourceId, ResourceKind, ResourceState,
};

/// Decoded pixels plus the texture created from them on first draw.
#[derive(Debug, Clone)]
pub struct ImagePayload {
    pub image: Arc<DecodedImage>,
    pub texture: Option<TextureHandle>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum RequestKey {
    Image(ImageRequest),
    Font(FontKey),
}

struct Entry {
    key: RequestKey,
    state: ResourceState,
    refcount: u32,
    listeners: Rc<Listeners<ResourceEvent>>,
    cancel: Option<CancelFlag>,
    image: Option<ImagePayload>,
    font: Option<Arc<dyn FontBackend>>,
    error: Option<DecodeError>,
}

/// Deduplicating store of loaded content.
///
/// Every request key maps to at most one live resource. Releasing the last
/// reference parks the resource in a pending-deletion set so that a quick
/// re-acquire (a node being re-created, a style toggling back) reuses it;
/// [`compact`](Self::compact) reclaims whatever is still unreferenced.
pub struct ResourceCache {
    entries: HashMap<ResourceId, Entry>,
    by_key: HashMap<RequestKey, ResourceId>,
    pending_deletion: Vec<ResourceId>,
    loader: Loader,
    assets: HashMap<String, Arc<[u8]>>,
    fonts: HashMap<FontKey, FontSource>,
    default_family: String,
    resource_root: Option<PathBuf>,
    orphaned_textures: Vec<TextureHandle>,
    next_serial: u64,
}

impl ResourceCache {
    pub fn new(loader: Loader, default_family: impl Into<String>) -> Self {
        Self {
            entries: HashMap::new(),
            by_key: HashMap::new(),
            pending_deletion: Vec::new(),
            loader,
            assets: HashMap::new(),
            fonts: HashMap::new(),
            default_family: default_family.into(),
            resource_root: None,
            orphaned_textures: Vec::new(),
            next_serial: 1,
        }
    }

    pub fn from_config(config: &RuneConfig) -> Self {
        let decoder = ImageCrateDecoder::new(config.loader.max_image_dimension);
        Self::with_decoder(config, Arc::new(decoder))
    }

    pub fn with_decoder(config: &RuneConfig, decoder: Arc<dyn ImageDecoder>) -> Self {
        let loader = Loader::new(config.loader.effective_workers(), decoder);
        let mut cache = Self::new(loader, config.scene.default_font_family.clone());
        cache.resource_root = config.loader.resource_root.clone();
        if let Some(path) = &config.text.font {
            let key = FontKey::new(config.scene.default_font_family.clone());
            cache.register_font(key, FontSource::File(path.clone(), 0));
        }
        cache
    }

    pub fn default_family(&self) -> &str {
        &self.default_family
    }

    pub fn set_resource_root(&mut self, root: Option<PathBuf>) {
        self.resource_root = root;
    }

    /// Serve `uri` from memory instead of the file system.
    pub fn register_asset(&mut self, uri: impl Into<String>, bytes: impl Into<Arc<[u8]>>) {
        self.assets.insert(uri.into(), bytes.into());
    }

    pub fn register_font(&mut self, key: FontKey, source: FontSource) {
        debug!(family = %key.family, weight = key.weight, "registering font source");
        self.fonts.insert(key, source);
    }

    /// Register a font whose bytes live at `uri`, resolved like image URIs.
    pub fn register_font_uri(&mut self, key: FontKey, uri: &str) {
        let source = match self.assets.get(uri) {
            Some(bytes) => FontSource::Bytes(bytes.clone(), 0),
            None => FontSource::File(self.resolve_path(uri), 0),
        };
        self.register_font(key, source);
    }

    pub fn acquire_image(&mut self, request: ImageRequest) -> ResourceId {
        self.acquire(RequestKey::Image(request))
    }

    pub fn acquire_font(&mut self, key: FontKey) -> ResourceId {
        self.acquire(RequestKey::Font(key))
    }

    fn acquire(&mut self, key: RequestKey) -> ResourceId {
        if let Some(&id) = self.by_key.get(&key) {
            if let Some(entry) = self.entries.get_mut(&id) {
                entry.refcount += 1;
                self.pending_deletion.retain(|p| *p != id);
                trace!(?id, refcount = entry.refcount, "resource re-acquired");
                return id;
            }
        }
        let kind = match key {
            RequestKey::Image(_) => ResourceKind::Image,
            RequestKey::Font(_) => ResourceKind::Font,
        };
        let id = ResourceId::new(kind, self.next_serial);
        self.next_serial += 1;
        self.by_key.insert(key.clone(), id);
        self.entries.insert(
            id,
            Entry {
                key,
                state: ResourceState::Init,
                refcount: 1,
                listeners: Rc::new(Listeners::new()),
                cancel: None,
                image: None,
                font: None,
                error: None,
            },
        );
        trace!(?id, "resource created");
        id
    }

    /// Start loading `id`. Only an `Init` resource moves to `Loading`;
    /// anything else is left alone and `false` is returned.
    pub fn load(&mut self, id: ResourceId) -> bool {
        let Some(entry) = self.entries.get(&id) else {
            return false;
        };
        if entry.state != ResourceState::Init {
            return false;
        }
        let job = match &entry.key {
            RequestKey::Image(request) => Some(Job::DecodeImage {
                source: self.image_source(&request.uri),
                resize: request.resize,
            }),
            RequestKey::Font(key) => self.font_source(key).map(Job::LoadFont),
        };
        let missing = match &entry.key {
            RequestKey::Font(key) => key.family.clone(),
            RequestKey::Image(request) => request.uri.clone(),
        };

        let cancel = match job {
            Some(job) => Some(self.loader.submit(id, job)),
            None => {
                self.loader
                    .complete_now(id, Err(DecodeError::NotFound(missing)));
                None
            }
        };
        if let Some(entry) = self.entries.get_mut(&id) {
            entry.state = ResourceState::Loading;
            entry.cancel = cancel;
        }
        true
    }

    /// Drop one reference. At zero the resource is reclaimed right away when
    /// `immediate`, otherwise it waits for the next [`compact`](Self::compact).
    pub fn release(&mut self, id: ResourceId, immediate: bool) {
        let Some(entry) = self.entries.get_mut(&id) else {
            trace!(?id, "release of unknown resource");
            return;
        };
        entry.refcount = entry.refcount.saturating_sub(1);
        if entry.refcount > 0 {
            return;
        }
        if immediate {
            self.reclaim(id);
        } else if !self.pending_deletion.contains(&id) {
            self.pending_deletion.push(id);
        }
    }

    /// Reclaim pending resources that are still unreferenced.
    pub fn compact(&mut self) -> usize {
        let pending = std::mem::take(&mut self.pending_deletion);
        let mut reclaimed = 0;
        for id in pending {
            if self.entries.get(&id).is_some_and(|e| e.refcount == 0) {
                self.reclaim(id);
                reclaimed += 1;
            }
        }
        if reclaimed > 0 {
            debug!(reclaimed, live = self.entries.len(), "compacted resource cache");
        }
        reclaimed
    }

    fn reclaim(&mut self, id: ResourceId) {
        self.pending_deletion.retain(|p| *p != id);
        let Some(entry) = self.entries.remove(&id) else {
            return;
        };
        if self.by_key.get(&entry.key) == Some(&id) {
            self.by_key.remove(&entry.key);
        }
        if let Some(cancel) = entry.cancel {
            if entry.state == ResourceState::Loading {
                cancel.cancel();
            }
        }
        if let Some(texture) = entry.image.and_then(|i| i.texture) {
            self.orphaned_textures.push(texture);
        }
        trace!(?id, "resource reclaimed");
    }

    pub fn contains(&self, id: ResourceId) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn state(&self, id: ResourceId) -> Option<ResourceState> {
        self.entries.get(&id).map(|e| e.state)
    }

    /// Live references, or 0 for an unknown resource.
    pub fn refcount(&self, id: ResourceId) -> u32 {
        self.entries.get(&id).map_or(0, |e| e.refcount)
    }

    pub fn is_pending_deletion(&self, id: ResourceId) -> bool {
        self.pending_deletion.contains(&id)
    }

    /// Resources currently held in the cache, referenced or not.
    pub fn instance_count(&self) -> usize {
        self.entries.len()
    }

    pub fn image(&self, id: ResourceId) -> Option<&ImagePayload> {
        self.entries.get(&id)?.image.as_ref()
    }

    pub(crate) fn image_mut(&mut self, id: ResourceId) -> Option<&mut ImagePayload> {
        self.entries.get_mut(&id)?.image.as_mut()
    }

    pub fn image_size(&self, id: ResourceId) -> Option<(u32, u32)> {
        self.image(id).map(|p| (p.image.width, p.image.height))
    }

    pub fn font(&self, id: ResourceId) -> Option<Arc<dyn FontBackend>> {
        self.entries.get(&id)?.font.clone()
    }

    pub fn error(&self, id: ResourceId) -> Option<&DecodeError> {
        self.entries.get(&id)?.error.as_ref()
    }

    /// Register for the terminal event of `id`. A listener added after the
    /// resource finished is called immediately.
    pub fn add_listener(
        &mut self,
        id: ResourceId,
        owner: ListenerOwner,
        callback: Callback<ResourceEvent>,
    ) -> Option<ListenerToken> {
        let entry = self.entries.get(&id)?;
        let token = entry.listeners.add(owner, callback);
        let event = match entry.state {
            ResourceState::Ready => Some(ResourceEvent::Ready(id)),
            ResourceState::Error => entry
                .error
                .clone()
                .map(|error| ResourceEvent::Error(id, error)),
            _ => None,
        };
        if let Some(event) = event {
            let listeners = entry.listeners.clone();
            listeners.notify_one(token, &event);
        }
        Some(token)
    }

    pub fn remove_listener(&mut self, id: ResourceId, token: ListenerToken) -> bool {
        self.entries
            .get(&id)
            .is_some_and(|e| e.listeners.remove(token))
    }

    pub fn remove_listeners_of(&mut self, owner: ListenerOwner) {
        for entry in self.entries.values() {
            entry.listeners.remove_owner(owner);
        }
    }

    pub fn listener_count(&self, id: ResourceId) -> usize {
        self.entries.get(&id).map_or(0, |e| e.listeners.len())
    }

    /// Apply finished loads on the owner thread and notify listeners.
    /// Returns the number of completions that were delivered.
    pub fn drain(&mut self) -> usize {
        let completions = self.loader.drain();
        self.deliver(completions)
    }

    /// Like [`drain`](Self::drain) but blocks up to `timeout` for the first
    /// completion. Meant for hosts and tests that run a threaded loader.
    pub fn wait(&mut self, timeout: Duration) -> usize {
        let completions = self.loader.wait(timeout);
        self.deliver(completions)
    }

    /// Whether any resource is still waiting on the loader.
    pub fn has_pending_loads(&self) -> bool {
        self.entries
            .values()
            .any(|e| e.state == ResourceState::Loading)
    }

    fn deliver(&mut self, completions: Vec<Completion>) -> usize {
        let mut delivered = 0;
        for completion in completions {
            if self.complete(completion) {
                delivered += 1;
            }
        }
        delivered
    }

    fn complete(&mut self, completion: Completion) -> bool {
        let Completion { id, result } = completion;
        let Some(entry) = self.entries.get_mut(&id) else {
            trace!(?id, "dropping completion for reclaimed resource");
            return false;
        };
        if entry.state != ResourceState::Loading {
            warn!(?id, state = ?entry.state, "dropping completion for resource that is not loading");
            return false;
        }
        entry.cancel = None;
        let event = match result {
            Ok(Payload::Image(image)) => {
                entry.image = Some(ImagePayload {
                    image: Arc::new(image),
                    texture: None,
                });
                entry.state = ResourceState::Ready;
                ResourceEvent::Ready(id)
            }
            Ok(Payload::Font(font)) => {
                entry.font = Some(font);
                entry.state = ResourceState::Ready;
                ResourceEvent::Ready(id)
            }
            Err(error) => {
                warn!(?id, %error, "resource failed to load");
                entry.error = Some(error.clone());
                entry.state = ResourceState::Error;
                ResourceEvent::Error(id, error)
            }
        };
        let listeners = entry.listeners.clone();
        listeners.dispatch(&event);
        true
    }

    /// Textures of reclaimed images; the owner destroys them on its sink.
    pub fn take_orphaned_textures(&mut self) -> Vec<TextureHandle> {
        std::mem::take(&mut self.orphaned_textures)
    }

    fn image_source(&self, uri: &str) -> ImageSource {
        match self.assets.get(uri) {
            Some(bytes) => ImageSource::Bytes(bytes.clone()),
            None => ImageSource::File(self.resolve_path(uri)),
        }
    }

    fn resolve_path(&self, uri: &str) -> PathBuf {
        let path = Path::new(uri.strip_prefix("file://").unwrap_or(uri));
        match &self.resource_root {
            Some(root) if path.is_relative() => root.join(path),
            _ => path.to_path_buf(),
        }
    }

    /// Exact key, else the closest face of the same family, else the closest
    /// face of the default family.
    fn font_source(&self, key: &FontKey) -> Option<FontSource> {
        if let Some(source) = self.fonts.get(key) {
            return Some(source.clone());
        }
        let closest = |family: &str| {
            self.fonts
                .iter()
                .filter(|(k, _)| k.family == family)
                .min_by_key(|(k, _)| {
                    (
                        k.style != key.style,
                        (k.weight as i32 - key.weight as i32).abs(),
                        k.weight,
                    )
                })
                .map(|(_, source)| source.clone())
        };
        closest(&key.family).or_else(|| closest(&self.default_family))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    use engine_core::{PixelFormat, ResizeHint};
    use rune_text::BoxFont;

    use crate::resource::FontStyle;

    struct StubDecoder;

    impl ImageDecoder for StubDecoder {
        fn decode(
            &self,
            source: &ImageSource,
            resize: Option<ResizeHint>,
        ) -> Result<DecodedImage, DecodeError> {
            match source {
                ImageSource::Bytes(b) if b.as_ref() == b"ok" => {
                    let (width, height) = resize.map_or((2, 2), |r| (r.width, r.height));
                    Ok(DecodedImage {
                        width,
                        height,
                        pixels: vec![255; (width * height * 4) as usize],
                        format: PixelFormat::Rgba8,
                    })
                }
                ImageSource::Bytes(_) => Err(DecodeError::Image("corrupt".into())),
                ImageSource::File(path) => Err(DecodeError::Io {
                    path: path.clone(),
                    message: "missing".into(),
                }),
            }
        }
    }

    fn cache() -> ResourceCache {
        let mut cache = ResourceCache::new(Loader::new(0, Arc::new(StubDecoder)), "sans");
        cache.register_asset("a.png", &b"ok"[..]);
        cache.register_asset("bad.png", &b"??"[..]);
        cache
    }

    fn recorder(cache: &mut ResourceCache, id: ResourceId) -> Rc<RefCell<Vec<ResourceEvent>>> {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        cache.add_listener(
            id,
            ListenerOwner::Host(1),
            Rc::new(move |e: &ResourceEvent| sink.borrow_mut().push(e.clone())),
        );
        seen
    }

    #[test]
    fn acquires_are_deduplicated_by_key() {
        let mut cache = cache();
        let a = cache.acquire_image(ImageRequest::new("a.png"));
        let b = cache.acquire_image(ImageRequest::new("a.png"));
        let resized = cache.acquire_image(ImageRequest {
            uri: "a.png".into(),
            resize: Some(ResizeHint {
                width: 4,
                height: 4,
            }),
        });
        assert_eq!(a, b);
        assert_ne!(a, resized);
        assert_eq!(cache.refcount(a), 2);
        assert_eq!(cache.instance_count(), 2);
    }

    #[test]
    fn load_walks_the_state_machine_once() {
        let mut cache = cache();
        let id = cache.acquire_image(ImageRequest::new("a.png"));
        assert_eq!(cache.state(id), Some(ResourceState::Init));
        assert!(cache.load(id));
        assert_eq!(cache.state(id), Some(ResourceState::Loading));
        assert!(!cache.load(id));
        let seen = recorder(&mut cache, id);
        assert_eq!(cache.drain(), 1);
        assert_eq!(cache.state(id), Some(ResourceState::Ready));
        assert_eq!(cache.image_size(id), Some((2, 2)));
        assert_eq!(*seen.borrow(), vec![ResourceEvent::Ready(id)]);
        assert!(!cache.load(id));
        assert_eq!(cache.drain(), 0);
        assert_eq!(seen.borrow().len(), 1);
    }

    #[test]
    fn failing_decode_reaches_error_and_notifies_once() {
        let mut cache = cache();
        let id = cache.acquire_image(ImageRequest::new("bad.png"));
        let seen = recorder(&mut cache, id);
        cache.load(id);
        cache.drain();
        cache.drain();
        assert_eq!(cache.state(id), Some(ResourceState::Error));
        assert!(cache.image(id).is_none());
        assert_eq!(seen.borrow().len(), 1);
        assert!(matches!(seen.borrow()[0], ResourceEvent::Error(_, DecodeError::Image(_))));

        let late = recorder(&mut cache, id);
        assert_eq!(late.borrow().len(), 1, "late listeners hear the terminal state");
    }

    #[test]
    fn immediate_release_of_all_references_empties_the_cache() {
        let mut cache = cache();
        let ids: Vec<_> = (0..3)
            .map(|_| cache.acquire_image(ImageRequest::new("a.png")))
            .collect();
        for id in &ids[..2] {
            cache.release(*id, true);
        }
        assert_eq!(cache.instance_count(), 1);
        cache.release(ids[2], true);
        assert_eq!(cache.instance_count(), 0);
    }

    #[test]
    fn deferred_release_survives_until_compact() {
        let mut cache = cache();
        let id = cache.acquire_image(ImageRequest::new("a.png"));
        cache.acquire_image(ImageRequest::new("a.png"));
        cache.release(id, false);
        assert_eq!(cache.compact(), 0);
        assert!(cache.contains(id));

        cache.release(id, false);
        assert!(cache.is_pending_deletion(id));
        let again = cache.acquire_image(ImageRequest::new("a.png"));
        assert_eq!(again, id);
        assert!(!cache.is_pending_deletion(id));
        cache.release(id, false);
        assert_eq!(cache.compact(), 1);
        assert!(!cache.contains(id));
        assert_ne!(cache.acquire_image(ImageRequest::new("a.png")), id);
    }

    #[test]
    fn reclaiming_a_loading_resource_suppresses_delivery() {
        let mut cache = cache();
        let id = cache.acquire_image(ImageRequest::new("a.png"));
        let seen = recorder(&mut cache, id);
        cache.load(id);
        cache.release(id, true);
        assert_eq!(cache.drain(), 0);
        assert!(seen.borrow().is_empty());
    }

    #[test]
    fn reclaimed_textures_are_handed_back() {
        let mut cache = cache();
        let id = cache.acquire_image(ImageRequest::new("a.png"));
        cache.load(id);
        cache.drain();
        cache.image_mut(id).unwrap().texture = Some(TextureHandle(9));
        cache.release(id, true);
        assert_eq!(cache.take_orphaned_textures(), vec![TextureHandle(9)]);
    }

    #[test]
    fn missing_files_resolve_against_the_root() {
        let mut cache = cache();
        cache.set_resource_root(Some(PathBuf::from("/assets")));
        let id = cache.acquire_image(ImageRequest::new("img/x.png"));
        cache.load(id);
        cache.drain();
        assert_eq!(
            cache.error(id),
            Some(&DecodeError::Io {
                path: PathBuf::from("/assets/img/x.png"),
                message: "missing".into()
            })
        );
    }

    #[test]
    fn font_lookup_falls_back_by_family_then_default() {
        let mut cache = cache();
        let regular: Arc<dyn FontBackend> = Arc::new(BoxFont::new(0.5));
        let bold: Arc<dyn FontBackend> = Arc::new(BoxFont::new(0.7));
        cache.register_font(FontKey::new("sans"), FontSource::Face(regular));
        cache.register_font(
            FontKey {
                family: "serif".into(),
                style: FontStyle::Normal,
                weight: 700,
            },
            FontSource::Face(bold),
        );

        let serif = cache.acquire_font(FontKey {
            family: "serif".into(),
            style: FontStyle::Italic,
            weight: 400,
        });
        let mono = cache.acquire_font(FontKey::new("mono"));
        cache.load(serif);
        cache.load(mono);
        cache.drain();
        let advance = |id| cache.font(id).map(|f| f.advance('a', 10.0));
        assert_eq!(advance(serif), Some(7.0));
        assert_eq!(advance(mono), Some(5.0));
    }

    #[test]
    fn unknown_font_without_default_is_not_found() {
        let mut cache = cache();
        let id = cache.acquire_font(FontKey::new("nothing"));
        cache.load(id);
        cache.drain();
        assert_eq!(cache.state(id), Some(ResourceState::Error));
        assert!(matches!(cache.error(id), Some(DecodeError::NotFound(_))));
    }
}
