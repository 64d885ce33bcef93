//! The query planner: lowers validated clause contexts into a DAG of
//! physical operators.

pub mod clauses;
pub mod context;
pub mod match_path;
pub mod node;
pub mod start;
pub mod subgraph;

pub use self::context::AliasType;
pub use self::context::Direction;
pub use self::context::EdgeInfo;
pub use self::context::NodeInfo;
pub use self::context::PathInfo;
pub use self::context::QueryContext;
pub use self::context::ReturnContext;
pub use self::context::SubgraphContext;
pub use self::context::UnwindContext;
pub use self::context::YieldItem;
pub use self::match_path::MatchPathPlanner;
pub use self::node::NodeId;
pub use self::node::NodeKind;
pub use self::node::PlanArena;
pub use self::node::PlanNode;
pub use self::node::SubPlan;
pub use self::subgraph::SubgraphPlanner;
