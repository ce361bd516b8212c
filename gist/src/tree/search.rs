use super::Tree;
use crate::cancel::CancelToken;
use crate::error::GistResult;
use crate::policy::Policy;
use crossbeam_channel::Sender;
use std::thread;
use storage::{Backend, PageId};

impl<B: Backend, P: Policy> Tree<B, P> {
    /// Streams every leaf value consistent with `query` into `sink`.
    ///
    /// Traversal is depth-first in on-page order. Each value is handed over
    /// individually and the walk blocks until the consumer takes it, so a
    /// rendezvous channel (`crossbeam_channel::bounded(0)`) bounds memory
    /// regardless of the result size. `sink` is dropped when the call
    /// returns, on every path, which ends the consumer's stream.
    ///
    /// Cancellation is checked before every emission and every descent and
    /// is reported as the call's error.
    pub fn search(
        &self,
        object: PageId,
        query: &P::Query,
        token: &CancelToken,
        sink: Sender<Vec<u8>>,
    ) -> GistResult<()> {
        token.check()?;
        let root = self.read_root(object)?;
        match root.root_page {
            Some(page) => self.search_page(page, query, token, &sink),
            None => Ok(()),
        }
    }

    fn search_page(
        &self,
        id: PageId,
        query: &P::Query,
        token: &CancelToken,
        sink: &Sender<Vec<u8>>,
    ) -> GistResult<()> {
        for entry in self.load_page(id)? {
            if !self.policy.consistent(&entry.value, query) {
                continue;
            }
            match entry.child {
                None => token.send(sink, entry.value)?,
                Some(child) => {
                    token.check()?;
                    self.search_page(child, query, token, sink)?;
                }
            }
        }
        Ok(())
    }

    /// Runs [`Tree::search`] on a scoped producer thread and collects the
    /// stream.
    pub fn search_to_vec(
        &self,
        object: PageId,
        query: &P::Query,
        token: &CancelToken,
    ) -> GistResult<Vec<Vec<u8>>> {
        let (tx, rx) = crossbeam_channel::bounded(0);

        thread::scope(|scope| {
            let producer = scope.spawn(move || self.search(object, query, token, tx));
            let items: Vec<Vec<u8>> = rx.iter().collect();
            match producer.join() {
                Ok(result) => result.map(|()| items),
                Err(panic) => std::panic::resume_unwind(panic),
            }
        })
    }
}
