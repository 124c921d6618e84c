//! DOM event wiring
//!
//! Forwards clicks, pointer hovers, link visibility and `popstate` to the
//! router. Clicks are listened for in the capture phase on the document so an
//! intercepted click never reaches the browser's default handling.

use std::rc::{Rc, Weak};
use wasm_bindgen::closure::Closure;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::spawn_local;
use waypoint::platform::{EventSource, ListenerHandle, NAVIGATION_END_EVENT};
use waypoint::route::OPT_OUT_ATTRIBUTE;
use waypoint::{ClickDecision, LinkClick, Modifiers, NavigationTrigger, PrefetchMode, Router};
use web_sys::{
    Document, Element, Event, EventTarget, HtmlAnchorElement, IntersectionObserver,
    IntersectionObserverEntry, MouseEvent, Window,
};

const LINK_SELECTOR: &str = "a[href]";

/// Event source over the live DOM
pub struct DomEvents {
    window: Window,
    document: Document,
}

impl DomEvents {
    pub fn new(window: Window, document: Document) -> Self {
        Self { window, document }
    }
}

struct Registration {
    target: EventTarget,
    event: &'static str,
    capture: bool,
    callback: Closure<dyn FnMut(Event)>,
}

/// Listeners attached by [`DomEvents`]
struct DomListeners {
    registrations: Vec<Registration>,
    observer: Option<(IntersectionObserver, Closure<dyn FnMut(js_sys::Array, IntersectionObserver)>)>,
}

impl ListenerHandle for DomListeners {
    fn detach(self: Box<Self>) {
        for registration in &self.registrations {
            let removed = registration.target.remove_event_listener_with_callback_and_bool(
                registration.event,
                registration.callback.as_ref().unchecked_ref(),
                registration.capture,
            );
            if let Err(e) = removed {
                tracing::warn!(event = registration.event, "Removing listener failed: {:?}", e);
            }
        }
        if let Some((observer, _)) = &self.observer {
            observer.disconnect();
        }
    }
}

fn listen(
    registrations: &mut Vec<Registration>,
    target: &EventTarget,
    event: &'static str,
    capture: bool,
    handler: impl FnMut(Event) + 'static,
) {
    let callback = Closure::<dyn FnMut(Event)>::new(handler);
    let added = target.add_event_listener_with_callback_and_bool(
        event,
        callback.as_ref().unchecked_ref(),
        capture,
    );
    match added {
        Ok(()) => registrations.push(Registration {
            target: target.clone(),
            event,
            capture,
            callback,
        }),
        Err(e) => tracing::warn!(event, "Adding listener failed: {:?}", e),
    }
}

/// The anchor an event happened in, if any
fn anchor_of(event: &Event) -> Option<HtmlAnchorElement> {
    let target: Element = event.target()?.dyn_into().ok()?;
    target.closest(LINK_SELECTOR).ok()??.dyn_into().ok()
}

fn href_of(anchor: &Element) -> Option<String> {
    anchor.get_attribute("href").filter(|href| !href.is_empty())
}

fn link_click(event: &MouseEvent, anchor: &HtmlAnchorElement) -> LinkClick {
    LinkClick {
        href: href_of(anchor).unwrap_or_default(),
        button: event.button(),
        modifiers: Modifiers {
            ctrl: event.ctrl_key(),
            meta: event.meta_key(),
            shift: event.shift_key(),
            alt: event.alt_key(),
        },
        target: anchor.get_attribute("target"),
        download: anchor.has_attribute("download"),
        opted_out: anchor.has_attribute(OPT_OUT_ATTRIBUTE),
    }
}

fn observe_links(document: &Document, observer: &IntersectionObserver) {
    let Ok(links) = document.query_selector_all(LINK_SELECTOR) else {
        return;
    };
    for i in 0..links.length() {
        if let Some(link) = links.item(i).and_then(|node| node.dyn_into::<Element>().ok()) {
            observer.observe(&link);
        }
    }
}

impl EventSource for DomEvents {
    fn attach(&self, router: Weak<Router>) -> Box<dyn ListenerHandle> {
        let mut registrations = Vec::new();
        let document: &EventTarget = self.document.as_ref();
        let window: &EventTarget = self.window.as_ref();

        let weak = router.clone();
        listen(&mut registrations, document, "click", true, move |event| {
            let Some(router) = weak.upgrade() else {
                return;
            };
            let (Some(mouse), Some(anchor)) = (event.dyn_ref::<MouseEvent>(), anchor_of(&event))
            else {
                return;
            };
            if event.default_prevented() {
                return;
            }

            match router.classify_click(&link_click(mouse, &anchor)) {
                ClickDecision::Intercept(url) => {
                    event.prevent_default();
                    spawn_local(async move {
                        router.navigate(url, NavigationTrigger::Click).await;
                    });
                }
                ClickDecision::PassThrough(reason) => {
                    tracing::trace!(?reason, "Click left to the browser");
                }
            }
        });

        let weak = router.clone();
        listen(&mut registrations, window, "popstate", false, move |_| {
            if let Some(router) = weak.upgrade() {
                spawn_local(async move {
                    router.on_history_change().await;
                });
            }
        });

        let mode = router
            .upgrade()
            .map(|r| r.config().prefetch_mode)
            .unwrap_or(PrefetchMode::None);

        let observer = match mode {
            PrefetchMode::Hover => {
                let weak = router.clone();
                listen(&mut registrations, document, "mouseover", false, move |event| {
                    let (Some(router), Some(href)) =
                        (weak.upgrade(), anchor_of(&event).and_then(|a| href_of(&a)))
                    else {
                        return;
                    };
                    spawn_local(async move { router.hover(&href).await });
                });

                let weak = router.clone();
                listen(&mut registrations, document, "mouseout", false, move |event| {
                    if let (Some(router), Some(href)) =
                        (weak.upgrade(), anchor_of(&event).and_then(|a| href_of(&a)))
                    {
                        router.unhover(&href);
                    }
                });
                None
            }
            PrefetchMode::Visible => {
                let weak = router.clone();
                let callback = Closure::<dyn FnMut(js_sys::Array, IntersectionObserver)>::new(
                    move |entries: js_sys::Array, observer: IntersectionObserver| {
                        let Some(router) = weak.upgrade() else {
                            return;
                        };
                        for entry in entries.iter() {
                            let Ok(entry) = entry.dyn_into::<IntersectionObserverEntry>() else {
                                continue;
                            };
                            if !entry.is_intersecting() {
                                continue;
                            }
                            let link = entry.target();
                            observer.unobserve(&link);
                            if let Some(href) = href_of(&link) {
                                let router = Rc::clone(&router);
                                spawn_local(async move { router.link_visible(&href).await });
                            }
                        }
                    },
                );

                match IntersectionObserver::new(callback.as_ref().unchecked_ref()) {
                    Ok(observer) => {
                        observe_links(&self.document, &observer);

                        // Links arrive with every swapped-in document.
                        let rescan_document = self.document.clone();
                        let rescan_observer = observer.clone();
                        listen(&mut registrations, window, NAVIGATION_END_EVENT, false, move |_| {
                            observe_links(&rescan_document, &rescan_observer);
                        });
                        Some((observer, callback))
                    }
                    Err(e) => {
                        tracing::warn!("IntersectionObserver unavailable: {:?}", e);
                        None
                    }
                }
            }
            PrefetchMode::None => None,
        };

        tracing::debug!(listeners = registrations.len(), ?mode, "DOM listeners attached");
        Box::new(DomListeners {
            registrations,
            observer,
        })
    }
}
