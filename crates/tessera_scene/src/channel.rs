//! Named broadcast channels.
//!
//! A [`Channel`] holds an ordered list of responders: systems (closures over
//! a caller-supplied context) and other channels. Emitting a channel runs
//! every responder in connection order and collects their responses. A
//! channel that is reached again while it is still emitting fails with
//! [`DispatchError::CyclicBroadcast`] instead of recursing forever.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use tracing::trace;

use crate::error::DispatchError;

type SystemFn<C, R> = dyn FnMut(&mut C) -> anyhow::Result<R>;

enum Responder<C, R> {
    System {
        name: String,
        run: RefCell<Box<SystemFn<C, R>>>,
    },
    Channel(Rc<Channel<C, R>>),
}

impl<C, R> Responder<C, R> {
    fn name(&self) -> &str {
        match self {
            Responder::System { name, .. } => name,
            Responder::Channel(channel) => channel.name(),
        }
    }
}

/// What one responder produced during an emission.
#[derive(Debug, Clone, PartialEq)]
pub enum Response<R> {
    /// The return value of a system.
    Value(R),
    /// The responses of a nested channel, in its connection order.
    Nested(Vec<Response<R>>),
}

impl<R> Response<R> {
    /// Flatten a response tree depth-first.
    #[must_use]
    pub fn flatten(responses: Vec<Response<R>>) -> Vec<R> {
        let mut values = Vec::new();
        let mut stack: Vec<_> = responses.into_iter().rev().collect();
        while let Some(response) = stack.pop() {
            match response {
                Response::Value(value) => values.push(value),
                Response::Nested(inner) => stack.extend(inner.into_iter().rev()),
            }
        }
        values
    }
}

/// Clears the active flag when an emission ends, however it ends.
struct Emitting<'a>(&'a Cell<bool>);

impl Drop for Emitting<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

/// A named, ordered broadcast list.
///
/// Channels are connected by `Rc`, so a channel may be a responder of many
/// others. Responders connected while the channel is emitting take part from
/// the next emission on.
///
/// ```rust
/// use std::rc::Rc;
/// use tessera_scene::{Channel, Response};
///
/// # fn main() -> Result<(), tessera_scene::DispatchError> {
/// let inner: Rc<Channel<u32, u32>> = Rc::new(Channel::new("inner"));
/// inner.connect_system("double", |n: &mut u32| Ok(*n * 2));
///
/// let outer = Channel::new("outer");
/// outer
///     .connect_system("bump", |n: &mut u32| {
///         *n += 1;
///         Ok(*n)
///     })
///     .connect_channel(Rc::clone(&inner));
///
/// let mut n = 1;
/// let responses = outer.emit(&mut n)?;
/// assert_eq!(Response::flatten(responses), vec![2, 4]);
/// # Ok(())
/// # }
/// ```
pub struct Channel<C, R = ()> {
    name: String,
    responders: RefCell<Vec<Rc<Responder<C, R>>>>,
    active: Cell<bool>,
}

impl<C, R> Channel<C, R> {
    /// Create an empty channel.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            responders: RefCell::new(Vec::new()),
            active: Cell::new(false),
        }
    }

    /// The channel's name, used in errors and logs.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Append a system responder.
    pub fn connect_system<F>(&self, name: impl Into<String>, system: F) -> &Self
    where
        F: FnMut(&mut C) -> anyhow::Result<R> + 'static,
    {
        self.responders.borrow_mut().push(Rc::new(Responder::System {
            name: name.into(),
            run: RefCell::new(Box::new(system)),
        }));
        self
    }

    /// Append a nested channel responder.
    ///
    /// Connecting a channel to itself, directly or through other channels,
    /// is accepted here and reported by [`Channel::emit`]. Such a cycle is
    /// also an `Rc` cycle; call [`Channel::clear`] to break it.
    pub fn connect_channel(&self, channel: Rc<Channel<C, R>>) -> &Self {
        self.responders
            .borrow_mut()
            .push(Rc::new(Responder::Channel(channel)));
        self
    }

    /// Remove every responder.
    pub fn clear(&self) {
        self.responders.borrow_mut().clear();
    }

    /// Number of direct responders.
    #[must_use]
    pub fn len(&self) -> usize {
        self.responders.borrow().len()
    }

    /// Returns `true` if nothing is connected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.responders.borrow().is_empty()
    }

    /// Names of the direct responders in connection order. Nested channels
    /// are listed by channel name.
    #[must_use]
    pub fn responders(&self) -> Vec<String> {
        self.responders
            .borrow()
            .iter()
            .map(|responder| responder.name().to_string())
            .collect()
    }

    /// Returns `true` while an emission of this channel is in progress.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active.get()
    }

    /// Run every responder in connection order and collect their responses.
    ///
    /// The first failing responder ends the emission; responders after it
    /// do not run. The active flag is cleared in every case.
    ///
    /// # Errors
    ///
    /// - [`DispatchError::CyclicBroadcast`] if this channel is already
    ///   emitting.
    /// - [`DispatchError::System`] if a system returns an error.
    pub fn emit(&self, ctx: &mut C) -> Result<Vec<Response<R>>, DispatchError> {
        if self.active.replace(true) {
            return Err(DispatchError::CyclicBroadcast {
                channel: self.name.clone(),
            });
        }
        let _emitting = Emitting(&self.active);

        let responders: Vec<_> = self.responders.borrow().clone();
        trace!(channel = %self.name, responders = responders.len(), "emitting");

        let mut responses = Vec::with_capacity(responders.len());
        for responder in &responders {
            let response = match responder.as_ref() {
                Responder::System { name, run } => {
                    // Only reachable again through a cycle back into this channel.
                    let mut run =
                        run.try_borrow_mut()
                            .map_err(|_| DispatchError::CyclicBroadcast {
                                channel: self.name.clone(),
                            })?;
                    let system = &mut **run;
                    let value = system(ctx).map_err(|source| DispatchError::System {
                        channel: self.name.clone(),
                        system: name.clone(),
                        source,
                    })?;
                    Response::Value(value)
                }
                Responder::Channel(channel) => Response::Nested(channel.emit(ctx)?),
            };
            responses.push(response);
        }
        Ok(responses)
    }
}

impl<C, R> fmt::Debug for Channel<C, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channel")
            .field("name", &self.name)
            .field("responders", &self.responders())
            .field("active", &self.active.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type Log = Vec<String>;

    fn record(tag: &'static str) -> impl FnMut(&mut Log) -> anyhow::Result<()> {
        move |log: &mut Log| {
            log.push(tag.to_string());
            Ok(())
        }
    }

    #[test]
    fn test_emit_runs_in_connection_order() {
        let channel: Channel<Log> = Channel::new("update");
        channel
            .connect_system("a", record("a"))
            .connect_system("b", record("b"))
            .connect_system("c", record("c"));

        let mut log = Log::new();
        let responses = channel.emit(&mut log).unwrap();
        assert_eq!(log, vec!["a", "b", "c"]);
        assert_eq!(responses.len(), 3);
        assert_eq!(channel.responders(), vec!["a", "b", "c"]);
        assert!(!channel.is_active());
    }

    #[test]
    fn test_nested_channels() {
        let physics: Rc<Channel<Log>> = Rc::new(Channel::new("physics"));
        physics.connect_system("integrate", record("integrate"));

        let update = Channel::new("update");
        update
            .connect_system("input", record("input"))
            .connect_channel(Rc::clone(&physics))
            .connect_system("render", record("render"));

        let mut log = Log::new();
        let responses = update.emit(&mut log).unwrap();
        assert_eq!(log, vec!["input", "integrate", "render"]);
        assert_eq!(
            responses,
            vec![
                Response::Value(()),
                Response::Nested(vec![Response::Value(())]),
                Response::Value(()),
            ]
        );
        assert_eq!(update.responders(), vec!["input", "physics", "render"]);
    }

    #[test]
    fn test_shared_channel_is_not_a_cycle() {
        let leaf: Rc<Channel<Log>> = Rc::new(Channel::new("leaf"));
        leaf.connect_system("leaf", record("leaf"));

        let root = Channel::new("root");
        root.connect_channel(Rc::clone(&leaf))
            .connect_channel(Rc::clone(&leaf));

        let mut log = Log::new();
        root.emit(&mut log).unwrap();
        assert_eq!(log, vec!["leaf", "leaf"]);
    }

    #[test]
    fn test_cycle_through_other_channel() {
        let d: Rc<Channel<Log>> = Rc::new(Channel::new("d"));
        let ch2: Rc<Channel<Log>> = Rc::new(Channel::new("ch2"));
        d.connect_system("before", record("before"))
            .connect_channel(Rc::clone(&ch2));
        ch2.connect_channel(Rc::clone(&d));

        let mut log = Log::new();
        let err = d.emit(&mut log).unwrap_err();
        assert!(matches!(err, DispatchError::CyclicBroadcast { ref channel } if channel == "d"));
        assert!(!d.is_active());
        assert!(!ch2.is_active());

        ch2.clear();
        log.clear();
        d.emit(&mut log).unwrap();
        assert_eq!(log, vec!["before"]);
    }

    #[test]
    fn test_self_connection() {
        let d: Rc<Channel<Log>> = Rc::new(Channel::new("d"));
        d.connect_channel(Rc::clone(&d));
        assert!(matches!(
            d.emit(&mut Log::new()),
            Err(DispatchError::CyclicBroadcast { .. })
        ));
        assert!(!d.is_active());
        d.clear();
    }

    #[test]
    fn test_system_error_stops_emission() {
        let channel: Channel<Log> = Channel::new("update");
        channel
            .connect_system("ok", record("ok"))
            .connect_system("fails", |_: &mut Log| anyhow::bail!("out of mana"))
            .connect_system("never", record("never"));

        let mut log = Log::new();
        let err = channel.emit(&mut log).unwrap_err();
        match err {
            DispatchError::System {
                channel: name,
                system,
                source,
            } => {
                assert_eq!(name, "update");
                assert_eq!(system, "fails");
                assert_eq!(source.to_string(), "out of mana");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(log, vec!["ok"]);
        assert!(!channel.is_active());

        // The channel stays usable.
        assert!(channel.emit(&mut log).is_err());
        assert_eq!(log, vec!["ok", "ok"]);
    }

    struct Reentry {
        target: Option<Rc<Channel<Reentry>>>,
        runs: u32,
    }

    #[test]
    fn test_system_emitting_its_own_channel() {
        let outer: Rc<Channel<Reentry>> = Rc::new(Channel::new("outer"));
        let inner: Rc<Channel<Reentry>> = Rc::new(Channel::new("inner"));
        outer.connect_system("emit-inner", |ctx: &mut Reentry| {
            ctx.runs += 1;
            if let Some(target) = ctx.target.take() {
                target.emit(ctx)?;
            }
            Ok(())
        });
        inner.connect_channel(Rc::clone(&outer));

        let mut ctx = Reentry {
            target: Some(Rc::clone(&inner)),
            runs: 0,
        };
        let err = outer.emit(&mut ctx).unwrap_err();
        let DispatchError::System { source, .. } = err else {
            panic!("expected a system error");
        };
        assert!(matches!(
            source.downcast_ref::<DispatchError>(),
            Some(DispatchError::CyclicBroadcast { channel }) if channel == "outer"
        ));
        assert!(!outer.is_active());
        assert!(!inner.is_active());
        inner.clear();
    }

    #[test]
    fn test_connect_during_emit_applies_next_time() {
        struct Grow {
            channel: Option<Rc<Channel<Grow>>>,
            runs: u32,
        }

        let channel: Rc<Channel<Grow>> = Rc::new(Channel::new("grow"));
        channel.connect_system("adder", |ctx: &mut Grow| {
            ctx.runs += 1;
            if let Some(channel) = ctx.channel.take() {
                channel.connect_system("late", |ctx: &mut Grow| {
                    ctx.runs += 10;
                    Ok(())
                });
            }
            Ok(())
        });

        let mut ctx = Grow {
            channel: Some(Rc::clone(&channel)),
            runs: 0,
        };
        channel.emit(&mut ctx).unwrap();
        assert_eq!(ctx.runs, 1);
        channel.emit(&mut ctx).unwrap();
        assert_eq!(ctx.runs, 12);
        assert_eq!(channel.len(), 2);
    }

    #[test]
    fn test_flatten() {
        let responses = vec![
            Response::Value(1),
            Response::Nested(vec![Response::Value(2), Response::Nested(vec![Response::Value(3)])]),
            Response::Value(4),
        ];
        assert_eq!(Response::flatten(responses), vec![1, 2, 3, 4]);
    }
}
