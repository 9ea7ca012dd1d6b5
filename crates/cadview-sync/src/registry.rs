// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Directory of live viewer instances keyed by placement.
//!
//! The registry holds weak references only: an engine's own lifecycle decides
//! when it dies, and the registry forgets it when told (unregister) or when a
//! sweep finds its inline container gone. [`ViewerContext`] is the
//! process-scoped handle through which every registry mutation happens.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::{Rc, Weak};

use cadview_port::{Anchor, HostDocument, ShellPort};

/// Identity of one registered instance; never reused within a context.
pub type InstanceId = u64;

/// Lifecycle surface the registry needs from a viewer instance.
pub trait ManagedViewer {
    /// Run the instance's full dispose contract. Idempotent.
    fn dispose(&mut self);
    /// Whether the instance has been disposed.
    fn is_disposed(&self) -> bool;
}

/// Shared handle to a registered instance.
pub type SharedViewer = Rc<RefCell<dyn ManagedViewer>>;

/// Where a viewer lives.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Placement {
    /// Inside a notebook cell container.
    Inline {
        /// Host document id of the container.
        container_id: String,
    },
    /// In a titled side panel.
    Named {
        /// Panel title; unique among named viewers.
        title: String,
        /// Docking position.
        anchor: Anchor,
    },
}

impl Placement {
    /// Registry key of this placement.
    pub fn key(&self) -> PlacementKey {
        match self {
            Placement::Inline { container_id } => PlacementKey::Inline(container_id.clone()),
            Placement::Named { title, .. } => PlacementKey::Named(title.clone()),
        }
    }
}

/// Registry key: container id or panel title.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PlacementKey {
    /// Inline container id.
    Inline(String),
    /// Named panel title.
    Named(String),
}

struct Entry {
    id: InstanceId,
    viewer: Weak<RefCell<dyn ManagedViewer>>,
}

impl Entry {
    fn live(&self) -> Option<SharedViewer> {
        self.viewer.upgrade()
    }
}

/// The registry proper. Reach it through [`ViewerContext`].
#[derive(Default)]
pub struct ViewerRegistry {
    inline: BTreeMap<String, Entry>,
    named: BTreeMap<String, Entry>,
    default_title: Option<String>,
    next_id: InstanceId,
}

impl std::fmt::Debug for ViewerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewerRegistry")
            .field("inline", &self.inline.keys().collect::<Vec<_>>())
            .field("named", &self.named.keys().collect::<Vec<_>>())
            .field("default_title", &self.default_title)
            .finish_non_exhaustive()
    }
}

impl ViewerRegistry {
    fn table(&mut self, key: &PlacementKey) -> (&mut BTreeMap<String, Entry>, String) {
        match key {
            PlacementKey::Inline(id) => (&mut self.inline, id.clone()),
            PlacementKey::Named(title) => (&mut self.named, title.clone()),
        }
    }

    /// Allocate the next instance id.
    pub fn next_id(&mut self) -> InstanceId {
        self.next_id += 1;
        self.next_id
    }

    /// Insert under an inline container id, returning the displaced live instance.
    pub fn register_inline(
        &mut self,
        container_id: &str,
        id: InstanceId,
        viewer: &SharedViewer,
    ) -> Option<SharedViewer> {
        self.register(&PlacementKey::Inline(container_id.to_owned()), id, viewer)
    }

    /// Insert under a panel title, returning the displaced live instance.
    pub fn register_named(
        &mut self,
        title: &str,
        id: InstanceId,
        viewer: &SharedViewer,
    ) -> Option<SharedViewer> {
        self.register(&PlacementKey::Named(title.to_owned()), id, viewer)
    }

    /// Insert under `key`, replacing (not disposing) any prior entry.
    pub fn register(
        &mut self,
        key: &PlacementKey,
        id: InstanceId,
        viewer: &SharedViewer,
    ) -> Option<SharedViewer> {
        let (table, name) = self.table(key);
        table
            .insert(
                name,
                Entry {
                    id,
                    viewer: Rc::downgrade(viewer),
                },
            )
            .and_then(|old| old.live())
    }

    /// Instance in an inline container, if live.
    pub fn lookup_inline(&self, container_id: &str) -> Option<SharedViewer> {
        self.inline.get(container_id).and_then(Entry::live)
    }

    /// Instance in a named panel, if live.
    pub fn lookup_named(&self, title: &str) -> Option<SharedViewer> {
        self.named.get(title).and_then(Entry::live)
    }

    /// Instance under `key`, if live.
    pub fn lookup(&self, key: &PlacementKey) -> Option<SharedViewer> {
        match key {
            PlacementKey::Inline(id) => self.lookup_inline(id),
            PlacementKey::Named(title) => self.lookup_named(title),
        }
    }

    /// Remove the entry under `key`. No-op if absent.
    pub fn unregister(&mut self, key: &PlacementKey) {
        let (table, name) = self.table(key);
        table.remove(&name);
    }

    /// Remove the entry under `key` only if it still belongs to instance `id`.
    ///
    /// A replaced instance disposing late must not evict its successor.
    pub fn unregister_instance(&mut self, key: &PlacementKey, id: InstanceId) -> bool {
        let (table, name) = self.table(key);
        if table.get(&name).is_some_and(|entry| entry.id == id) {
            table.remove(&name);
            return true;
        }
        false
    }

    /// Remove every inline entry whose container is gone from `host`.
    ///
    /// Returns the live instances of the removed entries; the caller disposes them.
    pub fn take_stale_inline(&mut self, host: &dyn HostDocument) -> Vec<(String, SharedViewer)> {
        let stale: Vec<String> = self
            .inline
            .keys()
            .filter(|id| !host.contains_container(id))
            .cloned()
            .collect();
        stale
            .into_iter()
            .filter_map(|id| {
                let entry = self.inline.remove(&id)?;
                entry.live().map(|viewer| (id, viewer))
            })
            .collect()
    }

    /// All registered keys, inline first.
    pub fn keys(&self) -> Vec<PlacementKey> {
        self.inline
            .keys()
            .cloned()
            .map(PlacementKey::Inline)
            .chain(self.named.keys().cloned().map(PlacementKey::Named))
            .collect()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.inline.len() + self.named.len()
    }

    /// Whether there are no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Title of the default named viewer.
    pub fn default_title(&self) -> Option<&str> {
        self.default_title.as_deref()
    }

    fn drain_live(&mut self) -> Vec<SharedViewer> {
        let inline = std::mem::take(&mut self.inline);
        let named = std::mem::take(&mut self.named);
        inline
            .into_values()
            .chain(named.into_values())
            .filter_map(|entry| entry.live())
            .collect()
    }
}

/// Host that reports every container as present (headless hosts, tests).
#[derive(Debug, Default, Clone, Copy)]
pub struct HeadlessHost;

impl HostDocument for HeadlessHost {
    fn contains_container(&self, _container_id: &str) -> bool {
        true
    }
}

/// Shell without docking surfaces.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullShell;

impl ShellPort for NullShell {
    fn attach(&mut self, _title: &str, _anchor: &Anchor) {}
    fn detach(&mut self, _title: &str) {}
}

struct ContextInner {
    registry: RefCell<ViewerRegistry>,
    host: Box<dyn HostDocument>,
    shell: RefCell<Box<dyn ShellPort>>,
    // removed from the registry while busy; strong so the dispose still happens
    deferred: RefCell<Vec<SharedViewer>>,
}

/// Process-scoped viewer context: registry plus host and shell ports.
///
/// Created at application start and cloned into every engine. All methods
/// complete their registry mutation before calling into any viewer, so a
/// viewer disposing itself re-entrantly never observes a half-updated registry.
#[derive(Clone)]
pub struct ViewerContext {
    inner: Rc<ContextInner>,
}

impl std::fmt::Debug for ViewerContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewerContext")
            .field("registry", &self.inner.registry)
            .finish_non_exhaustive()
    }
}

impl ViewerContext {
    /// A context over the given host document and shell.
    pub fn new(host: impl HostDocument + 'static, shell: impl ShellPort + 'static) -> Self {
        Self {
            inner: Rc::new(ContextInner {
                registry: RefCell::new(ViewerRegistry::default()),
                host: Box::new(host),
                shell: RefCell::new(Box::new(shell)),
                deferred: RefCell::new(Vec::new()),
            }),
        }
    }

    /// A context with no host document or shell.
    pub fn headless() -> Self {
        Self::new(HeadlessHost, NullShell)
    }

    /// Register `viewer` at `placement` under a fresh id.
    ///
    /// Returns the id and the displaced live instance, if any.
    pub fn register(
        &self,
        placement: &Placement,
        viewer: &SharedViewer,
    ) -> (InstanceId, Option<SharedViewer>) {
        self.retry_deferred();
        let mut registry = self.inner.registry.borrow_mut();
        let id = registry.next_id();
        let displaced = registry.register(&placement.key(), id, viewer);
        (id, displaced)
    }

    /// Live instance under `key`.
    pub fn lookup(&self, key: &PlacementKey) -> Option<SharedViewer> {
        self.inner.registry.borrow().lookup(key)
    }

    /// Forget instance `id` under `key`; entries owned by another instance stay.
    pub fn unregister(&self, key: &PlacementKey, id: InstanceId) -> bool {
        self.inner
            .registry
            .borrow_mut()
            .unregister_instance(key, id)
    }

    /// Dispose and forget every inline viewer whose container is gone.
    ///
    /// A viewer that is busy is disposed by a later context call instead.
    pub fn sweep_inline(&self) -> usize {
        self.retry_deferred();
        let stale = self
            .inner
            .registry
            .borrow_mut()
            .take_stale_inline(self.inner.host.as_ref());
        let count = stale.len();
        for (container_id, viewer) in stale {
            tracing::debug!(%container_id, "disposing stale inline viewer");
            self.dispose(viewer);
        }
        count
    }

    /// Dispose the named viewer `title`, if live. Returns whether one existed.
    pub fn dispose_named(&self, title: &str) -> bool {
        self.retry_deferred();
        let viewer = self.inner.registry.borrow().lookup_named(title);
        match viewer {
            Some(viewer) => {
                self.dispose(viewer);
                true
            }
            None => false,
        }
    }

    /// Run `viewer`'s dispose contract now, or queue it if the viewer is busy.
    ///
    /// Returns false when the dispose was deferred.
    pub fn dispose(&self, viewer: SharedViewer) -> bool {
        if let Ok(mut live) = viewer.try_borrow_mut() {
            live.dispose();
            return true;
        }
        tracing::warn!("viewer busy during dispose; deferred");
        self.inner.deferred.borrow_mut().push(viewer);
        false
    }

    /// Retry disposals deferred by [`ViewerContext::dispose`]. Returns how many ran.
    pub fn retry_deferred(&self) -> usize {
        let deferred = std::mem::take(&mut *self.inner.deferred.borrow_mut());
        let mut done = 0;
        for viewer in deferred {
            if self.dispose(viewer) {
                done += 1;
            }
        }
        done
    }

    /// Number of disposals waiting for a busy viewer.
    pub fn deferred_len(&self) -> usize {
        self.inner.deferred.borrow().len()
    }

    /// Dock a named viewer in the shell.
    pub fn attach(&self, title: &str, anchor: &Anchor) {
        self.inner.shell.borrow_mut().attach(title, anchor);
    }

    /// Remove a named viewer's docking artifact.
    pub fn detach(&self, title: &str) {
        self.inner.shell.borrow_mut().detach(title);
    }

    /// Make `title` the default named viewer.
    pub fn set_default(&self, title: &str) {
        self.inner.registry.borrow_mut().default_title = Some(title.to_owned());
    }

    /// The default named viewer, if set and live.
    pub fn default_viewer(&self) -> Option<SharedViewer> {
        let registry = self.inner.registry.borrow();
        registry
            .default_title
            .as_deref()
            .and_then(|title| registry.lookup_named(title))
    }

    /// Titles of live named viewers; disposed or dropped entries are pruned.
    pub fn live_named(&self) -> Vec<String> {
        let mut registry = self.inner.registry.borrow_mut();
        registry.named.retain(|_, entry| {
            entry
                .live()
                .is_some_and(|viewer| viewer.try_borrow().map_or(true, |v| !v.is_disposed()))
        });
        registry.named.keys().cloned().collect()
    }

    /// Dispose every registered viewer and retry deferred ones.
    ///
    /// Returns how many were live; busy viewers stay deferred.
    pub fn dispose_all(&self) -> usize {
        let mut viewers = {
            let mut registry = self.inner.registry.borrow_mut();
            registry.default_title = None;
            registry.drain_live()
        };
        viewers.append(&mut self.inner.deferred.borrow_mut());
        let count = viewers.len();
        for viewer in viewers {
            self.dispose(viewer);
        }
        count
    }

    /// Read-only access to the registry.
    pub fn with_registry<R>(&self, f: impl FnOnce(&ViewerRegistry) -> R) -> R {
        f(&self.inner.registry.borrow())
    }
}
