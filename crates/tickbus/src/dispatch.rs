//! Static dispatch from a published event to the right [`Subscriber`]
//! callback (spec.md §4.2 "each event type has a static dispatchTo").
//!
//! No `dyn Any` downcast and no event-kind tag to match on: each bus
//! only ever carries one concrete event type, so the worker loop just
//! calls `event.dispatch_to(subscriber)` and the right method call is
//! resolved at compile time.

use tickbus_core::{Bar, BookUpdate, OrderEvent, Subscriber, Trade};

use crate::handle::Handle;

pub trait Dispatch {
    fn dispatch_to(&self, subscriber: &mut dyn Subscriber);
}

impl Dispatch for Trade {
    fn dispatch_to(&self, subscriber: &mut dyn Subscriber) {
        subscriber.on_trade(self);
    }
}

impl Dispatch for Bar {
    fn dispatch_to(&self, subscriber: &mut dyn Subscriber) {
        subscriber.on_bar(self);
    }
}

impl Dispatch for OrderEvent {
    fn dispatch_to(&self, subscriber: &mut dyn Subscriber) {
        subscriber.on_order_event(self);
    }
}

impl Dispatch for BookUpdate {
    fn dispatch_to(&self, subscriber: &mut dyn Subscriber) {
        subscriber.on_book_update(self);
    }
}

impl Dispatch for Handle<BookUpdate> {
    fn dispatch_to(&self, subscriber: &mut dyn Subscriber) {
        subscriber.on_book_update(self);
    }
}
