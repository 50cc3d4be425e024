//! Bodies that only produce.

use crate::context::Body;
use crate::cx::Cx;
use crate::error::FlowResult;
use crate::params::Params;

/// Send every item of `items`, then return.
pub fn from_iter<V, I>(items: I) -> impl Body<V>
where
    V: Clone + Send + 'static,
    I: IntoIterator<Item = V> + Send + 'static,
{
    move |cx: &Cx<V>, _: Params<V>| -> FlowResult<Option<V>> {
        for item in items {
            cx.send(item)?;
        }
        Ok(None)
    }
}

/// Send `f()` forever. Only teardown stops it.
pub fn forever<V, F>(mut f: F) -> impl Body<V>
where
    V: Clone + Send + 'static,
    F: FnMut() -> V + Send + 'static,
{
    move |cx: &Cx<V>, _: Params<V>| -> FlowResult<Option<V>> {
        loop {
            cx.send(f())?;
        }
    }
}

/// Send `f(start)`, `f(start + 1)`, ... without end.
pub fn for_m<V, F>(start: u64, mut f: F) -> impl Body<V>
where
    V: Clone + Send + 'static,
    F: FnMut(u64) -> V + Send + 'static,
{
    move |cx: &Cx<V>, _: Params<V>| -> FlowResult<Option<V>> {
        for n in start.. {
            cx.send(f(n))?;
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Runtime;

    #[test]
    fn test_from_iter_drains() {
        let rt = Runtime::new();
        let fl = rt.flowlet(from_iter(vec!["a", "b"]), Params::new());
        let all: Vec<_> = fl.iter().collect::<FlowResult<_>>().unwrap();
        assert_eq!(all, vec!["a", "b"]);
    }

    #[test]
    fn test_forever_until_finalized() {
        let rt = Runtime::new();
        let mut n = 0;
        let fl = rt.flowlet(
            forever(move || {
                n += 1;
                n
            }),
            Params::new(),
        );
        let first: Vec<i32> = fl.iter().take(3).map(Result::unwrap).collect();
        assert_eq!(first, vec![1, 2, 3]);
        fl.finalize().unwrap();
        assert!(!fl.is_active());
    }

    #[test]
    fn test_for_m_counts_from_start() {
        let rt = Runtime::new();
        let fl = rt.flowlet(for_m(10, |n| n * 2), Params::new());
        assert_eq!(fl.recv().unwrap(), Some(20));
        assert_eq!(fl.recv().unwrap(), Some(22));
    }
}
