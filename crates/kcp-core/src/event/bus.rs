//! `EventBus`: publish/subscribe en proceso, fire-and-forget.
//!
//! - La lista de suscriptores es global al proceso, sólo se agrega (nunca se
//!   quita) y admite publish/subscribe concurrentes.
//! - Los handlers se invocan de forma síncrona en el hilo que publica, fuera
//!   de cualquier lock del bus.
//! - Un handler que falla o entra en pánico se registra en el log; nunca
//!   afecta al publicador ni al resto de handlers.
use std::any::{Any, TypeId};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use log::{debug, warn};

use super::Event;

/// Error devuelto por un handler.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

type ErasedHandler = Arc<dyn Fn(&EventContext, &dyn Any) -> Result<(), HandlerError> + Send + Sync>;

/// Contexto de entrega de un evento.
#[derive(Debug, Clone)]
pub struct EventContext {
    pub event_name: &'static str,
    pub published_at: DateTime<Utc>,
}

#[derive(Default)]
pub struct EventBus {
    subscribers: DashMap<TypeId, Vec<ErasedHandler>>,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
         .field("event_types", &self.subscribers.len())
         .finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registra `handler` para eventos de tipo `E`.
    pub fn subscribe<E, F>(&self, handler: F)
        where E: Event,
              F: Fn(&EventContext, &E) -> Result<(), HandlerError> + Send + Sync + 'static
    {
        let erased: ErasedHandler = Arc::new(move |ctx: &EventContext, ev: &dyn Any| match ev.downcast_ref::<E>() {
                                        Some(ev) => handler(ctx, ev),
                                        None => Ok(()),
                                    });
        self.subscribers.entry(TypeId::of::<E>()).or_default().push(erased);
    }

    /// Número de handlers registrados para `E`.
    pub fn subscriber_count<E: Event>(&self) -> usize {
        self.subscribers.get(&TypeId::of::<E>()).map_or(0, |h| h.len())
    }

    /// Entrega `event` a todos los handlers de su tipo. Nunca falla.
    pub fn publish<E: Event>(&self, event: E) {
        // se clona la lista para no retener el shard mientras corren los handlers
        let handlers: Vec<ErasedHandler> = match self.subscribers.get(&TypeId::of::<E>()) {
            Some(h) => h.clone(),
            None => {
                debug!("event {} published without subscribers", event.name());
                return;
            }
        };
        let ctx = EventContext { event_name: event.name(),
                                 published_at: Utc::now() };
        for handler in handlers {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| handler(&ctx, &event as &dyn Any)));
            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!("event handler for {} failed: {e}", ctx.event_name),
                Err(_) => warn!("event handler for {} panicked", ctx.event_name),
            }
        }
    }
}
