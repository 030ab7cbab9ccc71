//! Typed publish/subscribe primitives.
//!
//! This module provides the signal backbone shared by the engine, the backend client and the
//! panel proxy:
//! - [`Event`]: synchronous, ordered fan-out of a value to subscribed handlers
//! - [`Subscription`]: a handle that removes a single handler
//! - [`Signal`]: a folded "current value" view over another event (used for configuration)
//!
//! Firing is synchronous: every handler runs to completion before `fire` returns. If a handler
//! fires the event it is currently being dispatched from, the value is queued and delivered after
//! the current round instead of recursing. At most [`MAX_REENTRANT_FIRES`] queued values are
//! drained per outer `fire`; the rest are dropped with a warning.
//!
//! # Example
//!
//! ```rust
//! use infoview_core::event::Event;
//! use std::sync::{Arc, Mutex};
//!
//! let event = Event::<u32>::new();
//! let seen = Arc::new(Mutex::new(Vec::new()));
//! let seen_clone = Arc::clone(&seen);
//! let mut sub = event.subscribe(move |value| seen_clone.lock().unwrap().push(*value));
//!
//! event.fire(1);
//! sub.dispose();
//! event.fire(2);
//!
//! assert_eq!(*seen.lock().unwrap(), vec![1]);
//! ```

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Weak};

/// Upper bound on values queued by re-entrant fires during a single dispatch.
pub const MAX_REENTRANT_FIRES: usize = 1024;

/// Something that owns resources which can be released explicitly.
///
/// `dispose` must be idempotent.
pub trait Disposable {
    /// Release the resources held by this value.
    fn dispose(&mut self);
}

type Handler<T> = Arc<Mutex<Box<dyn FnMut(&T) + Send>>>;

struct EventInner<T> {
    handlers: Vec<(u64, Handler<T>)>,
    next_id: u64,
    disposed: bool,
    dispatching: bool,
    queued: VecDeque<T>,
    reentrant_fires: usize,
}

impl<T> EventInner<T> {
    fn is_subscribed(&self, id: u64) -> bool {
        self.handlers.iter().any(|(handler_id, _)| *handler_id == id)
    }
}

/// A typed, synchronous event.
///
/// Cloning an `Event` produces another handle to the same set of handlers.
pub struct Event<T> {
    inner: Arc<Mutex<EventInner<T>>>,
}

impl<T> Clone for Event<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for Event<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("Event")
            .field("handlers", &inner.handlers.len())
            .field("disposed", &inner.disposed)
            .finish_non_exhaustive()
    }
}

impl<T: Send + 'static> Default for Event<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send + 'static> Event<T> {
    /// Create an event with no handlers.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(EventInner {
                handlers: Vec::new(),
                next_id: 0,
                disposed: false,
                dispatching: false,
                queued: VecDeque::new(),
                reentrant_fires: 0,
            })),
        }
    }

    /// Register `handler`; it runs on every subsequent [`Event::fire`].
    ///
    /// Dropping the returned [`Subscription`] does not unsubscribe; call
    /// [`Subscription::dispose`] for that. Subscribing to a disposed event returns an inactive
    /// subscription.
    pub fn subscribe<F>(&self, handler: F) -> Subscription
    where
        F: FnMut(&T) + Send + 'static,
    {
        let mut inner = self.inner.lock();
        if inner.disposed {
            return Subscription::inactive();
        }

        let id = inner.next_id;
        inner.next_id += 1;
        inner
            .handlers
            .push((id, Arc::new(Mutex::new(Box::new(handler)))));

        let weak: Weak<Mutex<EventInner<T>>> = Arc::downgrade(&self.inner);
        Subscription::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.lock().handlers.retain(|(handler_id, _)| *handler_id != id);
            }
        })
    }

    /// Deliver `value` to every currently subscribed handler, in subscription order.
    ///
    /// No-op after [`Event::dispose`].
    pub fn fire(&self, value: T) {
        {
            let mut inner = self.inner.lock();
            if inner.disposed {
                return;
            }
            if inner.dispatching {
                if inner.reentrant_fires >= MAX_REENTRANT_FIRES {
                    tracing::warn!(
                        limit = MAX_REENTRANT_FIRES,
                        "dropping re-entrant event fire; handler chain looks cyclic"
                    );
                    return;
                }
                inner.reentrant_fires += 1;
                inner.queued.push_back(value);
                return;
            }
            inner.dispatching = true;
            inner.reentrant_fires = 0;
        }

        let _guard = DispatchGuard {
            inner: &self.inner,
        };

        let mut next = Some(value);
        while let Some(value) = next.take() {
            let handlers: Vec<(u64, Handler<T>)> = {
                let inner = self.inner.lock();
                if inner.disposed {
                    return;
                }
                inner
                    .handlers
                    .iter()
                    .map(|(id, handler)| (*id, Arc::clone(handler)))
                    .collect()
            };

            for (id, handler) in handlers {
                // A previous handler may have removed this one.
                if !self.inner.lock().is_subscribed(id) {
                    continue;
                }
                let mut handler = handler.lock();
                (*handler)(&value);
            }

            next = self.inner.lock().queued.pop_front();
        }
    }

    /// Number of currently subscribed handlers.
    pub fn handler_count(&self) -> usize {
        self.inner.lock().handlers.len()
    }

    /// Returns `true` once [`Event::dispose`] has been called.
    pub fn is_disposed(&self) -> bool {
        self.inner.lock().disposed
    }

    /// Remove all handlers and turn further fires into no-ops.
    pub fn dispose(&self) {
        let mut inner = self.inner.lock();
        inner.disposed = true;
        inner.handlers.clear();
        inner.queued.clear();
    }
}

impl<T: Send + 'static> Disposable for Event<T> {
    fn dispose(&mut self) {
        Event::dispose(self);
    }
}

struct DispatchGuard<'a, T> {
    inner: &'a Arc<Mutex<EventInner<T>>>,
}

impl<T> Drop for DispatchGuard<'_, T> {
    fn drop(&mut self) {
        let mut inner = self.inner.lock();
        inner.dispatching = false;
        inner.queued.clear();
    }
}

/// Handle returned by [`Event::subscribe`].
pub struct Subscription {
    unsubscribe: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    fn new(unsubscribe: impl FnOnce() + Send + 'static) -> Self {
        Self {
            unsubscribe: Some(Box::new(unsubscribe)),
        }
    }

    fn inactive() -> Self {
        Self { unsubscribe: None }
    }

    /// Returns `true` until [`Subscription::dispose`] is called.
    pub fn is_active(&self) -> bool {
        self.unsubscribe.is_some()
    }

    /// Remove the handler this subscription refers to.
    pub fn dispose(&mut self) {
        if let Some(unsubscribe) = self.unsubscribe.take() {
            unsubscribe();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}

impl Disposable for Subscription {
    fn dispose(&mut self) {
        Subscription::dispose(self);
    }
}

/// A list of disposables released together.
#[derive(Default)]
pub struct DisposableBag {
    items: Vec<Box<dyn Disposable + Send>>,
}

impl DisposableBag {
    /// Create an empty bag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a disposable to the bag.
    pub fn push(&mut self, item: impl Disposable + Send + 'static) {
        self.items.push(Box::new(item));
    }

    /// Number of disposables currently held.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns `true` if the bag holds nothing.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl Disposable for DisposableBag {
    fn dispose(&mut self) {
        for mut item in self.items.drain(..) {
            item.dispose();
        }
    }
}

impl fmt::Debug for DisposableBag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DisposableBag")
            .field("len", &self.items.len())
            .finish()
    }
}

/// A folded view over a source event.
///
/// On every source fire the signal computes `current = fold(&current, &value)` and fires the new
/// value to its own subscribers. The current value can also be read at any time with
/// [`Signal::current`].
pub struct Signal<T> {
    current: Arc<Mutex<T>>,
    initial: T,
    event: Event<T>,
    source: Arc<Mutex<Subscription>>,
}

impl<T: Clone> Clone for Signal<T> {
    fn clone(&self) -> Self {
        Self {
            current: Arc::clone(&self.current),
            initial: self.initial.clone(),
            event: self.event.clone(),
            source: Arc::clone(&self.source),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Signal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("current", &*self.current.lock())
            .finish_non_exhaustive()
    }
}

impl<T: Clone + Send + 'static> Signal<T> {
    /// Build a signal that folds every value of `source` into `initial`.
    pub fn scan<S, F>(mut fold: F, initial: T, source: &Event<S>) -> Self
    where
        S: Send + 'static,
        F: FnMut(&T, &S) -> T + Send + 'static,
    {
        let current = Arc::new(Mutex::new(initial.clone()));
        let event = Event::new();

        let subscription = {
            let current = Arc::clone(&current);
            let event = event.clone();
            source.subscribe(move |value| {
                let next = {
                    let mut current = current.lock();
                    let next = fold(&current, value);
                    *current = next.clone();
                    next
                };
                event.fire(next);
            })
        };

        Self {
            current,
            initial,
            event,
            source: Arc::new(Mutex::new(subscription)),
        }
    }

    /// The most recently folded value.
    pub fn current(&self) -> T {
        self.current.lock().clone()
    }

    /// Borrow the current value without cloning it.
    pub fn with_current<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.current.lock())
    }

    /// Subscribe to folded values.
    pub fn subscribe<F>(&self, handler: F) -> Subscription
    where
        F: FnMut(&T) + Send + 'static,
    {
        self.event.subscribe(handler)
    }

    /// Restore the initial value without notifying subscribers.
    pub fn reset(&self) {
        *self.current.lock() = self.initial.clone();
    }

    /// Stop following the source and drop all subscribers.
    pub fn dispose(&self) {
        self.source.lock().dispose();
        self.event.dispose();
    }
}

impl<T: Clone + Send + 'static> Disposable for Signal<T> {
    fn dispose(&mut self) {
        Signal::dispose(self);
    }
}
