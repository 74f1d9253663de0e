//! The cooperative, single-threaded, deterministic discrete-event loop.
//!
//! This is a from-scratch executor rather than `embassy-executor` driven by
//! `embassy-time`: the rest of the crate still leans on Embassy for its
//! concurrency *primitives* (see [`Event`], built on `embassy-sync`'s
//! `Signal`, and [`select`], re-exported from `embassy-futures`), because
//! their shapes are exactly the "one-shot latch" and "race two futures"
//! building blocks the simulator needs. What Embassy does NOT give us is a
//! time driver that jumps straight to the next pending deadline instead of
//! sleeping in real time — Embassy's own drivers exist to pace execution
//! against a real or scaled wall clock, which is the opposite of what a
//! bit-identical, run-as-fast-as-possible simulation needs. So `Scheduler`
//! owns its own timer heap and polls tasks itself; see DESIGN.md for the
//! full rationale.
//!
//! Determinism rests on two invariants: every timer is tagged with a
//! monotonically increasing sequence number at registration time, and ties
//! at equal deadlines fire in that sequence order; and newly spawned tasks
//! are appended to a FIFO ready queue, so they are polled in the order they
//! were spawned.

use std::cell::RefCell;
use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll, RawWaker, RawWakerVTable, Waker};

/// Simulated time, in microseconds, since the start of the run.
pub type SimTime = u64;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
struct TaskId(usize);

struct TimerEntry {
    deadline: SimTime,
    seq: u64,
    waker: Waker,
}

impl PartialEq for TimerEntry {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline && self.seq == other.seq
    }
}
impl Eq for TimerEntry {}
impl PartialOrd for TimerEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for TimerEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.deadline, self.seq).cmp(&(other.deadline, other.seq))
    }
}

struct TaskSlot {
    future: Pin<Box<dyn Future<Output = ()>>>,
}

struct Inner {
    now: SimTime,
    next_seq: u64,
    tasks: Vec<Option<TaskSlot>>,
    ready: VecDeque<usize>,
    timers: BinaryHeap<Reverse<TimerEntry>>,
}

/// Owner of simulated time and the cooperative task pool.
///
/// Cheap to clone — clones share the same underlying event loop, which is
/// the intended way to hand a scheduler handle to every [`crate::node`]
/// process and to [`crate::medium::Medium`].
#[derive(Clone)]
pub struct Scheduler {
    inner: Rc<RefCell<Inner>>,
}

impl Scheduler {
    pub fn new() -> Self {
        Scheduler {
            inner: Rc::new(RefCell::new(Inner {
                now: 0,
                next_seq: 0,
                tasks: Vec::new(),
                ready: VecDeque::new(),
                timers: BinaryHeap::new(),
            })),
        }
    }

    /// Current simulated time.
    pub fn now(&self) -> SimTime {
        self.inner.borrow().now
    }

    /// Schedule a new cooperative process to start running at `now()`.
    pub fn spawn(&self, future: impl Future<Output = ()> + 'static) {
        let mut inner = self.inner.borrow_mut();
        let id = inner.tasks.len();
        inner.tasks.push(Some(TaskSlot {
            future: Box::pin(future),
        }));
        inner.ready.push_back(id);
    }

    /// A future that resolves once `now() + delta` is reached.
    pub fn timeout(&self, delta: SimTime) -> Timer {
        Timer {
            inner: self.inner.clone(),
            deadline: self.now() + delta,
            registered: false,
        }
    }

    /// A future that resolves at the given absolute simulated instant.
    pub fn timeout_until(&self, deadline: SimTime) -> Timer {
        Timer {
            inner: self.inner.clone(),
            deadline,
            registered: false,
        }
    }

    /// Advance simulated time until `now() >= until` or no process has any
    /// pending work (no ready task and no pending timer), whichever comes
    /// first.
    pub fn run_until(&self, until: SimTime) {
        loop {
            self.drain_ready();

            let next_deadline = self
                .inner
                .borrow()
                .timers
                .peek()
                .map(|Reverse(t)| t.deadline);

            match next_deadline {
                Some(d) if d <= until => {
                    self.inner.borrow_mut().now = d;
                    self.fire_timers_at(d);
                    // Loop back around: firing timers may have queued tasks.
                }
                _ => {
                    let mut inner = self.inner.borrow_mut();
                    if inner.now < until {
                        inner.now = until;
                    }
                    break;
                }
            }
        }
    }

    fn drain_ready(&self) {
        loop {
            let next = self.inner.borrow_mut().ready.pop_front();
            match next {
                Some(id) => self.poll_task(id),
                None => break,
            }
        }
    }

    fn fire_timers_at(&self, deadline: SimTime) {
        loop {
            let entry = {
                let mut inner = self.inner.borrow_mut();
                match inner.timers.peek() {
                    Some(Reverse(t)) if t.deadline == deadline => inner.timers.pop(),
                    _ => None,
                }
            };
            match entry {
                Some(Reverse(t)) => t.waker.wake(),
                None => break,
            }
        }
    }

    fn poll_task(&self, id: usize) {
        let taken = {
            let mut inner = self.inner.borrow_mut();
            match inner.tasks.get_mut(id) {
                Some(slot) => slot.take(),
                None => None,
            }
        };
        let Some(mut slot) = taken else { return };

        let waker = make_waker(self.inner.clone(), id);
        let mut cx = Context::from_waker(&waker);
        match slot.future.as_mut().poll(&mut cx) {
            Poll::Ready(()) => {
                let mut inner = self.inner.borrow_mut();
                inner.tasks[id] = None;
            }
            Poll::Pending => {
                let mut inner = self.inner.borrow_mut();
                inner.tasks[id] = Some(slot);
            }
        }
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

/// A one-shot future that resolves once simulated time reaches a deadline.
///
/// Produced by [`Scheduler::timeout`] / [`Scheduler::timeout_until`]. Safe to
/// drop before it resolves (as happens on the losing side of a [`select`]):
/// its timer-heap entry is simply never looked at again once its waker no
/// longer points at a live task registration, beyond a single harmless
/// spurious poll.
pub struct Timer {
    inner: Rc<RefCell<Inner>>,
    deadline: SimTime,
    registered: bool,
}

impl Future for Timer {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        let this = self.get_mut();
        let now = this.inner.borrow().now;
        if now >= this.deadline {
            return Poll::Ready(());
        }
        if !this.registered {
            let mut inner = this.inner.borrow_mut();
            let seq = inner.next_seq;
            inner.next_seq += 1;
            inner.timers.push(Reverse(TimerEntry {
                deadline: this.deadline,
                seq,
                waker: cx.waker().clone(),
            }));
            this.registered = true;
        }
        Poll::Pending
    }
}

/// Race two futures, resuming on whichever resolves first; the other is
/// dropped. Thin re-export of `embassy_futures::select::select`, which is
/// exactly the "select(event, timeout)" primitive the station state machine
/// needs and carries no dependency on a registered time driver.
pub use embassy_futures::select::{Either, select};

/// A one-shot latch: any number of waiters may [`Event::wait`] on it, and
/// the first [`Event::succeed`] call wakes the (single) current waiter.
/// Subsequent `succeed()` calls are no-ops, matching the "not yet triggered"
/// idempotence §4.3 requires of the energy-preemption callbacks.
///
/// Built on `embassy_sync::signal::Signal` with a `NoopRawMutex` — this
/// process never spawns a second OS thread, so the no-op (non-atomic)
/// critical section embassy-sync provides for single-threaded executors is
/// exactly the right fit.
pub struct Event {
    signal: embassy_sync::signal::Signal<embassy_sync::blocking_mutex::raw::NoopRawMutex, ()>,
    fired: std::cell::Cell<bool>,
}

impl Event {
    pub fn new() -> Self {
        Event {
            signal: embassy_sync::signal::Signal::new(),
            fired: std::cell::Cell::new(false),
        }
    }

    /// Fire the latch. No-op if already fired.
    pub fn succeed(&self) {
        if !self.fired.replace(true) {
            self.signal.signal(());
        }
    }

    pub fn is_triggered(&self) -> bool {
        self.fired.get()
    }

    /// Suspend until [`Event::succeed`] is called.
    pub async fn wait(&self) {
        self.signal.wait().await;
    }
}

impl Default for Event {
    fn default() -> Self {
        Self::new()
    }
}

struct WakeData {
    inner: Rc<RefCell<Inner>>,
    id: usize,
}

// SAFETY: this executor and every Waker it hands out lives entirely on one
// thread; the simulator never spawns a second OS thread and these wakers
// are never sent across a thread boundary, so the non-atomic `Rc` refcount
// inside `WakeData` is never touched concurrently. `std::task::Waker`
// requires `Send + Sync` unconditionally regardless of the backing data,
// which is the standard (and standard-documented) caveat of hand-rolling a
// single-threaded executor this way.
const VTABLE: RawWakerVTable = RawWakerVTable::new(
    waker_clone,
    waker_wake,
    waker_wake_by_ref,
    waker_drop,
);

fn make_waker(inner: Rc<RefCell<Inner>>, id: usize) -> Waker {
    let data = Rc::into_raw(Rc::new(WakeData { inner, id })) as *const ();
    unsafe { Waker::from_raw(RawWaker::new(data, &VTABLE)) }
}

unsafe fn waker_clone(data: *const ()) -> RawWaker {
    unsafe {
        Rc::increment_strong_count(data as *const WakeData);
    }
    RawWaker::new(data, &VTABLE)
}

unsafe fn waker_wake(data: *const ()) {
    unsafe {
        let rc = Rc::from_raw(data as *const WakeData);
        rc.inner.borrow_mut().ready.push_back(rc.id);
    }
}

unsafe fn waker_wake_by_ref(data: *const ()) {
    unsafe {
        let rc = Rc::from_raw(data as *const WakeData);
        rc.inner.borrow_mut().ready.push_back(rc.id);
        std::mem::forget(rc);
    }
}

unsafe fn waker_drop(data: *const ()) {
    unsafe {
        drop(Rc::from_raw(data as *const WakeData));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell as StdRefCell;
    use std::rc::Rc as StdRc;

    #[test]
    fn timeout_advances_time_and_resolves() {
        let sched = Scheduler::new();
        let fired = StdRc::new(StdRefCell::new(false));
        let fired2 = fired.clone();
        let s = sched.clone();
        sched.spawn(async move {
            s.timeout(100).await;
            *fired2.borrow_mut() = true;
        });
        sched.run_until(50);
        assert!(!*fired.borrow());
        sched.run_until(200);
        assert!(*fired.borrow());
        assert_eq!(sched.now(), 200);
    }

    #[test]
    fn same_instant_timers_fire_in_insertion_order() {
        let sched = Scheduler::new();
        let order = StdRc::new(StdRefCell::new(Vec::new()));
        for i in 0..5 {
            let s = sched.clone();
            let order = order.clone();
            sched.spawn(async move {
                s.timeout(10).await;
                order.borrow_mut().push(i);
            });
        }
        sched.run_until(10);
        assert_eq!(*order.borrow(), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn event_wakes_waiter_and_is_idempotent() {
        let sched = Scheduler::new();
        let event = StdRc::new(Event::new());
        let woke = StdRc::new(StdRefCell::new(false));
        let event2 = event.clone();
        let woke2 = woke.clone();
        sched.spawn(async move {
            event2.wait().await;
            *woke2.borrow_mut() = true;
        });
        sched.run_until(0);
        assert!(!*woke.borrow());
        event.succeed();
        event.succeed(); // no-op, must not panic or double-fire
        sched.run_until(0);
        assert!(*woke.borrow());
    }

    #[test]
    fn select_resolves_on_first_and_drops_loser() {
        let sched = Scheduler::new();
        let result = StdRc::new(StdRefCell::new(None));
        let event = StdRc::new(Event::new());
        let s = sched.clone();
        let result2 = result.clone();
        let event2 = event.clone();
        sched.spawn(async move {
            match select(event2.wait(), s.timeout(1000)).await {
                Either::First(()) => *result2.borrow_mut() = Some("event"),
                Either::Second(()) => *result2.borrow_mut() = Some("timeout"),
            }
        });
        sched.run_until(10);
        event.succeed();
        sched.run_until(20);
        assert_eq!(*result.borrow(), Some("event"));
    }

    #[test]
    fn run_until_stops_when_no_pending_work() {
        let sched = Scheduler::new();
        sched.spawn(async {});
        sched.run_until(1_000_000);
        assert_eq!(sched.now(), 1_000_000);
    }
}
