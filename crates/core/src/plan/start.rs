//! The start-vid finder chain.
//!
//! A pattern gets its first candidate ids from whichever strategy
//! accepts first: an index seek, an alias bound by an earlier clause, a
//! literal vid list, or a full tag scan as the last resort.

use crate::err::Error;
use crate::plan::context::{NodeInfo, QueryContext};
use crate::plan::node::{NodeKind, SubPlan};

pub trait StartVidFinder {
	fn name(&self) -> &'static str;

	/// Does this strategy apply to the node?
	fn matches(&self, qctx: &QueryContext, node: &NodeInfo) -> bool;

	/// Build the seed sub-plan producing one column named after the
	/// node's alias, holding candidate vertex ids.
	fn transform(&self, qctx: &mut QueryContext, node: &NodeInfo) -> Result<SubPlan, Error>;
}

/// The registered chain, in acceptance order.
pub fn finders() -> Vec<Box<dyn StartVidFinder>> {
	vec![
		Box::new(IndexSeekFinder),
		Box::new(ArgumentFinder),
		Box::new(VidListFinder),
		Box::new(TagScanFinder),
	]
}

/// Seeds from a secondary index seek the validator resolved.
struct IndexSeekFinder;

impl StartVidFinder for IndexSeekFinder {
	fn name(&self) -> &'static str {
		"index_seek"
	}

	fn matches(&self, _qctx: &QueryContext, node: &NodeInfo) -> bool {
		node.index_hint.is_some()
	}

	fn transform(&self, qctx: &mut QueryContext, node: &NodeInfo) -> Result<SubPlan, Error> {
		let Some((index, values)) = node.index_hint.clone() else {
			return Err(Error::NoStartVid);
		};
		let var = qctx.new_var();
		let id = qctx.arena.add(
			NodeKind::IndexScan {
				space: qctx.space.desc().id,
				index,
				values,
			},
			vec![node.alias.clone()],
			var,
		);
		Ok(SubPlan {
			tail: id,
			root: id,
		})
	}
}

/// Seeds from an alias an earlier clause already bound.
struct ArgumentFinder;

impl StartVidFinder for ArgumentFinder {
	fn name(&self) -> &'static str {
		"argument"
	}

	fn matches(&self, qctx: &QueryContext, node: &NodeInfo) -> bool {
		!node.alias.is_empty() && qctx.is_bound(&node.alias)
	}

	fn transform(&self, qctx: &mut QueryContext, node: &NodeInfo) -> Result<SubPlan, Error> {
		let var = qctx.new_var();
		let id = qctx.arena.add(
			NodeKind::Argument {
				alias: node.alias.clone(),
			},
			vec![node.alias.clone()],
			var,
		);
		Ok(SubPlan {
			tail: id,
			root: id,
		})
	}
}

/// Seeds from ids the filter pinned literally.
struct VidListFinder;

impl StartVidFinder for VidListFinder {
	fn name(&self) -> &'static str {
		"vid_list"
	}

	fn matches(&self, _qctx: &QueryContext, node: &NodeInfo) -> bool {
		!node.vids.is_empty()
	}

	fn transform(&self, qctx: &mut QueryContext, node: &NodeInfo) -> Result<SubPlan, Error> {
		let var = qctx.new_var();
		let id = qctx.arena.add(
			NodeKind::VidList {
				vids: node.vids.clone(),
			},
			vec![node.alias.clone()],
			var,
		);
		Ok(SubPlan {
			tail: id,
			root: id,
		})
	}
}

/// The last resort: scan a whole tag.
struct TagScanFinder;

impl StartVidFinder for TagScanFinder {
	fn name(&self) -> &'static str {
		"tag_scan"
	}

	fn matches(&self, _qctx: &QueryContext, node: &NodeInfo) -> bool {
		!node.tags.is_empty()
	}

	fn transform(&self, qctx: &mut QueryContext, node: &NodeInfo) -> Result<SubPlan, Error> {
		let var = qctx.new_var();
		let id = qctx.arena.add(
			NodeKind::ScanVertices {
				space: qctx.space.desc().id,
				tag: node.tags[0],
			},
			vec![node.alias.clone()],
			var,
		);
		Ok(SubPlan {
			tail: id,
			root: id,
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::meta::SpaceInfo;
	use crate::meta::schema::{SpaceDesc, VidType};
	use crate::val::Value;
	use std::sync::Arc;

	fn qctx() -> QueryContext {
		QueryContext::new(Arc::new(SpaceInfo {
			desc: Some(SpaceDesc {
				id: 1,
				name: "s".into(),
				partition_num: 1,
				replica_factor: 1,
				vid_type: VidType::Int64,
			}),
			..Default::default()
		}))
	}

	#[test]
	fn chain_prefers_index_over_scan() {
		let mut ctx = qctx();
		let node = NodeInfo {
			alias: "a".into(),
			tags: vec![7],
			vids: vec![Value::Int(1)],
			index_hint: Some((3, vec![Value::Int(9)])),
			..Default::default()
		};
		let finder = finders().into_iter().find(|f| f.matches(&ctx, &node)).unwrap();
		assert_eq!(finder.name(), "index_seek");
		let plan = finder.transform(&mut ctx, &node).unwrap();
		assert!(matches!(
			ctx.arena.node(plan.root).kind,
			NodeKind::IndexScan {
				..
			}
		));
	}

	#[test]
	fn vid_list_beats_tag_scan() {
		let ctx = qctx();
		let node = NodeInfo {
			alias: "a".into(),
			tags: vec![7],
			vids: vec![Value::Int(1)],
			..Default::default()
		};
		let finder = finders().into_iter().find(|f| f.matches(&ctx, &node)).unwrap();
		assert_eq!(finder.name(), "vid_list");
	}
}
