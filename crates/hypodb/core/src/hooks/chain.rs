// Dotlanth
// Copyright (C) 2025 Synerthink

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.

// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

use hypodb_common::{Oid, RtIndex};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

use super::{PlannerHook, StandardHooks};
use crate::context::StatementContext;
use crate::error::HypoResult;
use crate::host::{PartitionDesc, PartitionKey, PlannedStmt, PlannerInfo, QueryDesc, RangeTblEntry, RelOptInfo};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HookError {
    #[error("interceptor {handle} cannot be uninstalled before {top}, which was installed after it")]
    OutOfOrder { handle: HookHandle, top: HookHandle },
    #[error("no interceptor is installed with handle {0}")]
    UnknownHandle(HookHandle),
}

/// Identifies one installation of an interceptor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HookHandle(u64);

impl fmt::Display for HookHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

struct Installed {
    handle: HookHandle,
    hook: Arc<dyn PlannerHook>,
}

/// The interceptor stack in front of the host's standard hooks
pub struct HookChain {
    host: Arc<dyn StandardHooks>,
    layers: Vec<Installed>,
    next_handle: u64,
}

impl HookChain {
    pub fn new(host: Arc<dyn StandardHooks>) -> Self {
        Self {
            host,
            layers: Vec::new(),
            next_handle: 1,
        }
    }

    /// Entry point for calling an extensibility point through the whole stack
    pub fn dispatch(&self) -> Next<'_> {
        Next {
            chain: self,
            remaining: &self.layers,
        }
    }

    /// Pushes an interceptor on top of the stack
    pub fn install(&mut self, hook: Arc<dyn PlannerHook>) -> HookHandle {
        let handle = HookHandle(self.next_handle);
        self.next_handle += 1;
        debug!("Installing interceptor {} as {}", hook.name(), handle);
        self.layers.push(Installed { handle, hook });
        handle
    }

    /// Removes the top-most interceptor, which must be the one `handle` refers to
    pub fn uninstall(&mut self, handle: HookHandle) -> Result<Arc<dyn PlannerHook>, HookError> {
        let Some(top) = self.layers.last() else {
            return Err(HookError::UnknownHandle(handle));
        };
        if top.handle != handle {
            if self.layers.iter().any(|layer| layer.handle == handle) {
                return Err(HookError::OutOfOrder { handle, top: top.handle });
            }
            return Err(HookError::UnknownHandle(handle));
        }

        let removed = self.layers.pop().ok_or(HookError::UnknownHandle(handle))?;
        debug!("Uninstalled interceptor {} ({})", removed.hook.name(), handle);
        Ok(removed.hook)
    }

    /// Names of the installed interceptors, bottom first
    pub fn installed_names(&self) -> Vec<String> {
        self.layers.iter().map(|layer| layer.hook.name().to_string()).collect()
    }

    pub fn depth(&self) -> usize {
        self.layers.len()
    }
}

/// Continuation into the rest of the interceptor stack
#[derive(Clone, Copy)]
pub struct Next<'a> {
    chain: &'a HookChain,
    remaining: &'a [Installed],
}

impl<'a> Next<'a> {
    /// The full chain, for calling a different extensibility point from the top
    pub fn chain(&self) -> &'a HookChain {
        self.chain
    }

    fn split(self) -> Option<(&'a Arc<dyn PlannerHook>, Next<'a>)> {
        let (top, rest) = self.remaining.split_last()?;
        Some((
            &top.hook,
            Next {
                chain: self.chain,
                remaining: rest,
            },
        ))
    }

    pub fn process_utility(self, ctx: &mut StatementContext, stmt: &PlannedStmt, desc: &mut QueryDesc) -> HypoResult<()> {
        match self.split() {
            Some((hook, next)) => hook.process_utility(ctx, stmt, desc, next),
            None => self.chain.host.process_utility(self.chain, ctx, stmt, desc),
        }
    }

    pub fn executor_end(self, ctx: &mut StatementContext, desc: &mut QueryDesc) -> HypoResult<()> {
        match self.split() {
            Some((hook, next)) => hook.executor_end(ctx, desc, next),
            None => self.chain.host.executor_end(self.chain, ctx, desc),
        }
    }

    pub fn get_relation_info(self, ctx: &StatementContext, root: &mut PlannerInfo, relation_oid: Oid, inhparent: bool, rel: &mut RelOptInfo) -> HypoResult<()> {
        match self.split() {
            Some((hook, next)) => hook.get_relation_info(ctx, root, relation_oid, inhparent, rel, next),
            None => self.chain.host.get_relation_info(self.chain, ctx, root, relation_oid, inhparent, rel),
        }
    }

    pub fn set_rel_pathlist(self, ctx: &StatementContext, root: &mut PlannerInfo, rel: &mut RelOptInfo, rti: RtIndex) -> HypoResult<()> {
        match self.split() {
            Some((hook, next)) => hook.set_rel_pathlist(ctx, root, rel, rti, next),
            None => self.chain.host.set_rel_pathlist(self.chain, ctx, root, rel, rti),
        }
    }

    pub fn partition_desc(self, ctx: &StatementContext, relid: Oid) -> HypoResult<Option<Arc<PartitionDesc>>> {
        match self.split() {
            Some((hook, next)) => hook.partition_desc(ctx, relid, next),
            None => self.chain.host.partition_desc(self.chain, ctx, relid),
        }
    }

    pub fn partition_key(self, ctx: &StatementContext, relid: Oid) -> HypoResult<Option<Arc<PartitionKey>>> {
        match self.split() {
            Some((hook, next)) => hook.partition_key(ctx, relid, next),
            None => self.chain.host.partition_key(self.chain, ctx, relid),
        }
    }

    pub fn has_subclass(self, ctx: &StatementContext, relid: Oid) -> HypoResult<bool> {
        match self.split() {
            Some((hook, next)) => hook.has_subclass(ctx, relid, next),
            None => self.chain.host.has_subclass(self.chain, ctx, relid),
        }
    }

    pub fn find_all_inheritors(self, ctx: &StatementContext, relid: Oid) -> HypoResult<Vec<Oid>> {
        match self.split() {
            Some((hook, next)) => hook.find_all_inheritors(ctx, relid, next),
            None => self.chain.host.find_all_inheritors(self.chain, ctx, relid),
        }
    }

    pub fn expand_child_rtentries(self, ctx: &StatementContext, root: &mut PlannerInfo, parent_rti: RtIndex, partdesc: Option<&PartitionDesc>) -> HypoResult<()> {
        match self.split() {
            Some((hook, next)) => hook.expand_child_rtentries(ctx, root, parent_rti, partdesc, next),
            None => self.chain.host.expand_child_rtentries(self.chain, ctx, root, parent_rti, partdesc),
        }
    }

    pub fn build_child_rtentry(self, ctx: &StatementContext, child: &mut RangeTblEntry, parent_oid: Oid, child_oid: Oid) -> HypoResult<()> {
        match self.split() {
            Some((hook, next)) => hook.build_child_rtentry(ctx, child, parent_oid, child_oid, next),
            None => self.chain.host.build_child_rtentry(self.chain, ctx, child, parent_oid, child_oid),
        }
    }

    pub fn explain_index_name(self, ctx: &StatementContext, index_oid: Oid) -> HypoResult<Option<String>> {
        match self.split() {
            Some((hook, next)) => hook.explain_index_name(ctx, index_oid, next),
            None => self.chain.host.explain_index_name(self.chain, ctx, index_oid),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HypoError;

    struct BareHost;

    impl StandardHooks for BareHost {
        fn process_utility(&self, _: &HookChain, _: &mut StatementContext, _: &PlannedStmt, _: &mut QueryDesc) -> HypoResult<()> {
            Ok(())
        }

        fn executor_end(&self, _: &HookChain, ctx: &mut StatementContext, _: &mut QueryDesc) -> HypoResult<()> {
            ctx.simulation.close();
            Ok(())
        }

        fn get_relation_info(&self, _: &HookChain, _: &StatementContext, _: &mut PlannerInfo, _: Oid, _: bool, _: &mut RelOptInfo) -> HypoResult<()> {
            Ok(())
        }

        fn set_rel_pathlist(&self, _: &HookChain, _: &StatementContext, _: &mut PlannerInfo, _: &mut RelOptInfo, _: RtIndex) -> HypoResult<()> {
            Ok(())
        }

        fn partition_desc(&self, _: &HookChain, _: &StatementContext, _: Oid) -> HypoResult<Option<Arc<PartitionDesc>>> {
            Ok(None)
        }

        fn partition_key(&self, _: &HookChain, _: &StatementContext, _: Oid) -> HypoResult<Option<Arc<PartitionKey>>> {
            Ok(None)
        }

        fn has_subclass(&self, _: &HookChain, _: &StatementContext, _: Oid) -> HypoResult<bool> {
            Ok(false)
        }

        fn find_all_inheritors(&self, _: &HookChain, _: &StatementContext, relid: Oid) -> HypoResult<Vec<Oid>> {
            Ok(vec![relid])
        }

        fn expand_child_rtentries(&self, _: &HookChain, _: &StatementContext, _: &mut PlannerInfo, _: RtIndex, _: Option<&PartitionDesc>) -> HypoResult<()> {
            Ok(())
        }

        fn build_child_rtentry(&self, _: &HookChain, _: &StatementContext, _: &mut RangeTblEntry, _: Oid, _: Oid) -> HypoResult<()> {
            Ok(())
        }

        fn explain_index_name(&self, _: &HookChain, _: &StatementContext, _: Oid) -> HypoResult<Option<String>> {
            Ok(Some("host".to_string()))
        }
    }

    /// Prefixes its name onto whatever the rest of the chain answers
    struct Tagger(&'static str);

    impl PlannerHook for Tagger {
        fn name(&self) -> &str {
            self.0
        }

        fn explain_index_name(&self, ctx: &StatementContext, index_oid: Oid, next: Next<'_>) -> HypoResult<Option<String>> {
            let inner = next.explain_index_name(ctx, index_oid)?.unwrap_or_default();
            Ok(Some(format!("{}>{}", self.0, inner)))
        }
    }

    struct Failing;

    impl PlannerHook for Failing {
        fn name(&self) -> &str {
            "failing"
        }

        fn has_subclass(&self, _: &StatementContext, _: Oid, _: Next<'_>) -> HypoResult<bool> {
            Err(HypoError::Interceptor {
                hook: "failing".to_string(),
                message: "boom".to_string(),
            })
        }
    }

    fn chain() -> HookChain {
        HookChain::new(Arc::new(BareHost))
    }

    fn index_name(chain: &HookChain) -> Option<String> {
        chain.dispatch().explain_index_name(&StatementContext::default(), Oid(1)).unwrap()
    }

    #[test]
    fn test_empty_chain_runs_host() {
        let chain = chain();
        assert_eq!(index_name(&chain).as_deref(), Some("host"));
        assert_eq!(chain.depth(), 0);
    }

    #[test]
    fn test_most_recent_runs_first() {
        let mut chain = chain();
        chain.install(Arc::new(Tagger("a")));
        chain.install(Arc::new(Tagger("b")));
        assert_eq!(index_name(&chain).as_deref(), Some("b>a>host"));
        assert_eq!(chain.installed_names(), vec!["a", "b"]);
    }

    #[test]
    fn test_default_methods_delegate() {
        let mut chain = chain();
        chain.install(Arc::new(Tagger("a")));
        let inheritors = chain.dispatch().find_all_inheritors(&StatementContext::default(), Oid(7)).unwrap();
        assert_eq!(inheritors, vec![Oid(7)]);
    }

    #[test]
    fn test_uninstall_restores_prior_chain() {
        let mut chain = chain();
        let a = chain.install(Arc::new(Tagger("a")));
        let before = index_name(&chain);
        let b = chain.install(Arc::new(Tagger("b")));

        let removed = chain.uninstall(b).unwrap();
        assert_eq!(removed.name(), "b");
        assert_eq!(index_name(&chain), before);

        chain.uninstall(a).unwrap();
        assert_eq!(index_name(&chain).as_deref(), Some("host"));
    }

    #[test]
    fn test_out_of_order_uninstall_rejected() {
        let mut chain = chain();
        let a = chain.install(Arc::new(Tagger("a")));
        let b = chain.install(Arc::new(Tagger("b")));

        assert_eq!(chain.uninstall(a).unwrap_err(), HookError::OutOfOrder { handle: a, top: b });
        assert_eq!(chain.depth(), 2);
        assert_eq!(index_name(&chain).as_deref(), Some("b>a>host"));
    }

    #[test]
    fn test_uninstalled_hook_debug_shows_name() {
        let mut chain = chain();
        let a = chain.install(Arc::new(Tagger("a")));
        let removed = chain.uninstall(a);
        assert_eq!(format!("{removed:?}"), r#"Ok(PlannerHook { name: "a" })"#);
    }

    #[test]
    fn test_unknown_handle() {
        let mut chain = chain();
        let a = chain.install(Arc::new(Tagger("a")));
        chain.uninstall(a).unwrap();
        assert_eq!(chain.uninstall(a).unwrap_err(), HookError::UnknownHandle(a));
    }

    #[test]
    fn test_interceptor_errors_propagate() {
        let mut chain = chain();
        chain.install(Arc::new(Failing));
        chain.install(Arc::new(Tagger("outer")));
        let err = chain.dispatch().has_subclass(&StatementContext::default(), Oid(1)).unwrap_err();
        assert!(matches!(err, HypoError::Interceptor { .. }));
    }
}
