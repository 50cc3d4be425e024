//! Bodies that await from an upstream.
//!
//! Each stage stops when its upstream delivers nothing.

use crate::context::Body;
use crate::cx::Cx;
use crate::error::FlowResult;
use crate::params::Params;

/// Send `f(x)` for every `x` awaited.
pub fn pipe<V, F>(mut f: F) -> impl Body<V>
where
    V: Clone + Send + 'static,
    F: FnMut(V) -> V + Send + 'static,
{
    move |cx: &Cx<V>, _: Params<V>| -> FlowResult<Option<V>> {
        while let Some(x) = cx.recv()? {
            cx.send(f(x))?;
        }
        Ok(None)
    }
}

/// Consume every value with `f`, sending nothing.
pub fn sink<V, F>(mut f: F) -> impl Body<V>
where
    V: Clone + Send + 'static,
    F: FnMut(V) + Send + 'static,
{
    move |cx: &Cx<V>, _: Params<V>| -> FlowResult<Option<V>> {
        while let Some(x) = cx.recv()? {
            f(x);
        }
        Ok(None)
    }
}

/// Forward the values that satisfy `keep`.
pub fn filter<V, F>(mut keep: F) -> impl Body<V>
where
    V: Clone + Send + 'static,
    F: FnMut(&V) -> bool + Send + 'static,
{
    move |cx: &Cx<V>, _: Params<V>| -> FlowResult<Option<V>> {
        while let Some(x) = cx.recv()? {
            if keep(&x) {
                cx.send(x)?;
            }
        }
        Ok(None)
    }
}

/// Drop values until `open` first holds, then forward everything from that
/// value on.
pub fn barrier<V, F>(mut open: F) -> impl Body<V>
where
    V: Clone + Send + 'static,
    F: FnMut(&V) -> bool + Send + 'static,
{
    move |cx: &Cx<V>, _: Params<V>| -> FlowResult<Option<V>> {
        let mut opened = false;
        while let Some(x) = cx.recv()? {
            opened = opened || open(&x);
            if opened {
                cx.send(x)?;
            }
        }
        Ok(None)
    }
}

/// Forward the first `n` values, then close the upstream and return.
pub fn take<V>(n: usize) -> impl Body<V>
where
    V: Clone + Send + 'static,
{
    move |cx: &Cx<V>, _: Params<V>| -> FlowResult<Option<V>> {
        for _ in 0..n {
            match cx.recv()? {
                Some(x) => cx.send(x)?,
                None => break,
            }
        }
        if cx.has_upstream() {
            cx.close()?;
        }
        Ok(None)
    }
}

/// Await `n` values, close the upstream and send them as one batch.
pub fn collect<V>(n: usize) -> impl Body<V>
where
    V: Clone + Send + From<Vec<V>> + 'static,
{
    move |cx: &Cx<V>, _: Params<V>| -> FlowResult<Option<V>> {
        let mut batch = Vec::with_capacity(n);
        while batch.len() < n {
            match cx.recv()? {
                Some(x) => batch.push(x),
                None => break,
            }
        }
        if cx.has_upstream() {
            cx.close()?;
        }
        cx.send(V::from(batch))?;
        Ok(None)
    }
}
