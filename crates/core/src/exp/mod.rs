//! The expression tree evaluated by filters, projections and the
//! storage-side push-down paths.

pub mod context;
pub mod visitor;

pub use self::context::EmptyContext;
pub use self::context::ExpressionContext;
pub use self::context::RowContext;
pub use self::visitor::Rewriter;
pub use self::visitor::Visitor;

use revision::revisioned;
use revision::Revisioned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::err::Error;
use crate::fnc;
use crate::fnc::aggregate::AggKind;
use crate::fnc::operate;
use crate::val::{NullKind, Value};

/// Unary operators.
#[revisioned(revision = 1)]
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum UnaryOp {
	Not,
	Negate,
	IsNull,
	IsNotNull,
}

/// Binary arithmetic and relational operators.
#[revisioned(revision = 1)]
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum BinaryOp {
	Add,
	Subtract,
	Multiply,
	Divide,
	Modulo,
	Equal,
	NotEqual,
	LessThan,
	LessThanOrEqual,
	MoreThan,
	MoreThanOrEqual,
	In,
	Contains,
	StartsWith,
	EndsWith,
}

/// Logical connectives over two or more operands.
#[revisioned(revision = 1)]
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum LogicalOp {
	And,
	Or,
	Xor,
}

/// Targets of an explicit type cast.
#[revisioned(revision = 1)]
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum CastType {
	Int,
	Float,
	String,
	Bool,
}

/// The quantifier of a predicate expression.
#[revisioned(revision = 1)]
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum PredicateKind {
	All,
	Any,
	None,
	Single,
}

/// One arm of a case expression.
#[revisioned(revision = 1)]
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct CaseBranch {
	pub when: Expression,
	pub then: Expression,
}

/// One entry of a map literal.
#[revisioned(revision = 1)]
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct MapEntry {
	pub key: String,
	pub value: Expression,
}

/// An immutable expression tree.
///
/// Nodes are cheap to clone, structurally comparable, and carry a stable
/// binary encoding so plans can ship filters to the storage layer.
#[revisioned(revision = 1)]
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum Expression {
	/// A literal value
	Constant(Value),
	Unary {
		op: UnaryOp,
		expr: Box<Expression>,
	},
	Binary {
		left: Box<Expression>,
		op: BinaryOp,
		right: Box<Expression>,
	},
	Logical {
		op: LogicalOp,
		operands: Vec<Expression>,
	},
	TypeCast {
		target: CastType,
		expr: Box<Expression>,
	},
	/// Attribute access: `expr.name`
	Attribute {
		expr: Box<Expression>,
		name: String,
	},
	/// Subscript access: `expr[index]`
	Subscript {
		expr: Box<Expression>,
		index: Box<Expression>,
	},
	Case {
		/// `CASE selector WHEN …` when present, generic `CASE WHEN …` otherwise
		selector: Option<Box<Expression>>,
		branches: Vec<CaseBranch>,
		default: Option<Box<Expression>>,
	},
	ListLiteral(Vec<Expression>),
	SetLiteral(Vec<Expression>),
	MapLiteral(Vec<MapEntry>),
	/// `[var IN input WHERE filter | mapping]`
	ListComprehension {
		var: String,
		input: Box<Expression>,
		filter: Option<Box<Expression>>,
		mapping: Option<Box<Expression>>,
	},
	/// `all/any/none/single(var IN input WHERE filter)`
	Predicate {
		kind: PredicateKind,
		var: String,
		input: Box<Expression>,
		filter: Box<Expression>,
	},
	/// `reduce(acc = init, var IN input | mapping)`
	Reduce {
		acc: String,
		init: Box<Expression>,
		var: String,
		input: Box<Expression>,
		mapping: Box<Expression>,
	},
	FunctionCall {
		name: String,
		args: Vec<Expression>,
	},
	/// An aggregate application; accumulation is driven by the
	/// `Aggregate` operator, evaluation yields the aggregated input
	Aggregate {
		kind: AggKind,
		distinct: bool,
		arg: Box<Expression>,
	},
	/// The current destination vertex (`VERTEX` / `$$`)
	VertexRef,
	/// The current edge (`EDGE`)
	EdgeRef,
	/// A property of the hop's source vertex: `$^.tag.prop`
	SrcProp {
		tag: String,
		prop: String,
	},
	/// A property of the hop's destination vertex: `$$.tag.prop`
	DstProp {
		tag: String,
		prop: String,
	},
	/// A property of the current edge: `edge_name.prop`
	EdgeProp {
		prop: String,
	},
	/// A positional reference into the input row
	Column(u32),
	/// A named column of the input row (also used for bare aliases)
	InputProp(String),
	/// A named column of a named variable
	VarProp {
		var: String,
		prop: String,
	},
	/// Builds a path value from alternating vertex/edge columns
	PathBuild(Vec<Expression>),
	/// A pattern embedded in an expression; rewritten by the planner
	/// into a rollup sub-plan and never evaluated directly
	MatchPathPattern {
		aliases: Vec<String>,
	},
	/// A fresh v4 uuid string
	Uuid,
	/// A query parameter
	Parameter(String),
}

impl Expression {
	/// Shorthand for a constant expression.
	pub fn constant(v: impl Into<Value>) -> Expression {
		Expression::Constant(v.into())
	}

	/// Shorthand for a binary expression.
	pub fn binary(left: Expression, op: BinaryOp, right: Expression) -> Expression {
		Expression::Binary {
			left: Box::new(left),
			op,
			right: Box::new(right),
		}
	}

	/// Shorthand for an and-chain.
	pub fn and(operands: Vec<Expression>) -> Expression {
		Expression::Logical {
			op: LogicalOp::And,
			operands,
		}
	}

	/// Evaluate this expression against a context.
	///
	/// Evaluation is total: failures surface as typed nulls in the
	/// resulting [`Value`], never as errors.
	pub fn eval(&self, ctx: &dyn ExpressionContext) -> Value {
		match self {
			Expression::Constant(v) => v.clone(),
			Expression::Unary {
				op,
				expr,
			} => {
				let v = expr.eval(ctx);
				match op {
					UnaryOp::Not => operate::not(&v),
					UnaryOp::Negate => operate::neg(&v),
					UnaryOp::IsNull => operate::is_null(&v),
					UnaryOp::IsNotNull => operate::not(&operate::is_null(&v)),
				}
			}
			Expression::Binary {
				left,
				op,
				right,
			} => {
				let l = left.eval(ctx);
				let r = right.eval(ctx);
				match op {
					BinaryOp::Add => operate::add(&l, &r),
					BinaryOp::Subtract => operate::sub(&l, &r),
					BinaryOp::Multiply => operate::mul(&l, &r),
					BinaryOp::Divide => operate::div(&l, &r),
					BinaryOp::Modulo => operate::rem(&l, &r),
					BinaryOp::Equal => operate::equal(&l, &r),
					BinaryOp::NotEqual => operate::not_equal(&l, &r),
					BinaryOp::LessThan => operate::less_than(&l, &r),
					BinaryOp::LessThanOrEqual => operate::less_than_or_equal(&l, &r),
					BinaryOp::MoreThan => operate::more_than(&l, &r),
					BinaryOp::MoreThanOrEqual => operate::more_than_or_equal(&l, &r),
					BinaryOp::In => operate::is_in(&l, &r),
					BinaryOp::Contains => operate::contains(&l, &r),
					BinaryOp::StartsWith => operate::starts_with(&l, &r),
					BinaryOp::EndsWith => operate::ends_with(&l, &r),
				}
			}
			Expression::Logical {
				op,
				operands,
			} => {
				// Short-circuit where a definite result is known
				let mut acc = match operands.first() {
					Some(e) => e.eval(ctx),
					None => return Value::null(),
				};
				for e in &operands[1..] {
					match (op, &acc) {
						(LogicalOp::And, Value::Bool(false)) => return Value::Bool(false),
						(LogicalOp::Or, Value::Bool(true)) => return Value::Bool(true),
						_ => {}
					}
					let r = e.eval(ctx);
					acc = match op {
						LogicalOp::And => operate::and(&acc, &r),
						LogicalOp::Or => operate::or(&acc, &r),
						LogicalOp::Xor => operate::xor(&acc, &r),
					};
				}
				acc
			}
			Expression::TypeCast {
				target,
				expr,
			} => cast(*target, &expr.eval(ctx)),
			Expression::Attribute {
				expr,
				name,
			} => expr.eval(ctx).attr(name),
			Expression::Subscript {
				expr,
				index,
			} => expr.eval(ctx).subscript(&index.eval(ctx)),
			Expression::Case {
				selector,
				branches,
				default,
			} => {
				let sel = selector.as_ref().map(|s| s.eval(ctx));
				for branch in branches {
					let w = branch.when.eval(ctx);
					let hit = match &sel {
						Some(s) => operate::equal(s, &w) == Value::Bool(true),
						None => w.is_truthy(),
					};
					if hit {
						return branch.then.eval(ctx);
					}
				}
				match default {
					Some(d) => d.eval(ctx),
					None => Value::null(),
				}
			}
			Expression::ListLiteral(items) => {
				Value::List(items.iter().map(|e| e.eval(ctx)).collect())
			}
			Expression::SetLiteral(items) => {
				Value::set_from(items.iter().map(|e| e.eval(ctx)))
			}
			Expression::MapLiteral(items) => {
				let mut m = BTreeMap::new();
				for entry in items {
					m.insert(entry.key.clone(), entry.value.eval(ctx));
				}
				Value::Map(m)
			}
			Expression::ListComprehension {
				var,
				input,
				filter,
				mapping,
			} => {
				let items = match input.eval(ctx) {
					Value::List(l) => l,
					Value::Set(s) => s,
					Value::Null(k) => return Value::Null(k),
					_ => return Value::Null(NullKind::BadType),
				};
				let mut out = Vec::with_capacity(items.len());
				for item in items {
					let scope = Bind::new(ctx, var, item.clone());
					if let Some(f) = filter {
						if !f.eval(&scope).is_truthy() {
							continue;
						}
					}
					out.push(match mapping {
						Some(m) => m.eval(&scope),
						None => item,
					});
				}
				Value::List(out)
			}
			Expression::Predicate {
				kind,
				var,
				input,
				filter,
			} => {
				let items = match input.eval(ctx) {
					Value::List(l) => l,
					Value::Set(s) => s,
					Value::Null(k) => return Value::Null(k),
					_ => return Value::Null(NullKind::BadType),
				};
				let mut matched = 0usize;
				for item in items {
					let scope = Bind::new(ctx, var, item);
					if filter.eval(&scope).is_truthy() {
						matched += 1;
					}
				}
				let ok = match kind {
					PredicateKind::All => matched == count_all(self, ctx),
					PredicateKind::Any => matched > 0,
					PredicateKind::None => matched == 0,
					PredicateKind::Single => matched == 1,
				};
				Value::Bool(ok)
			}
			Expression::Reduce {
				acc,
				init,
				var,
				input,
				mapping,
			} => {
				let items = match input.eval(ctx) {
					Value::List(l) => l,
					Value::Set(s) => s,
					Value::Null(k) => return Value::Null(k),
					_ => return Value::Null(NullKind::BadType),
				};
				let mut state = init.eval(ctx);
				for item in items {
					let scope = Bind::new2(ctx, acc, state, var, item);
					state = mapping.eval(&scope);
				}
				state
			}
			Expression::FunctionCall {
				name,
				args,
			} => match fnc::get(name) {
				Some(f) => {
					let vals: Vec<Value> = args.iter().map(|e| e.eval(ctx)).collect();
					f.call(&vals)
				}
				None => Value::Null(NullKind::BadType),
			},
			Expression::Aggregate {
				arg,
				..
			} => arg.eval(ctx),
			Expression::VertexRef => ctx.dst_vertex().clone(),
			Expression::EdgeRef => ctx.edge().clone(),
			Expression::SrcProp {
				tag,
				prop,
			} => vertex_prop(ctx.src_vertex(), tag, prop),
			Expression::DstProp {
				tag,
				prop,
			} => vertex_prop(ctx.dst_vertex(), tag, prop),
			Expression::EdgeProp {
				prop,
			} => ctx.edge().attr(prop),
			Expression::Column(idx) => ctx.input_column(*idx as usize).clone(),
			Expression::InputProp(name) => ctx.input_prop(name).clone(),
			Expression::VarProp {
				var,
				prop,
			} => {
				let v = ctx.var_prop(var, prop);
				if v.is_empty_value() {
					ctx.variable(var).attr(prop)
				} else {
					v.clone()
				}
			}
			Expression::PathBuild(items) => build_path(items, ctx),
			Expression::MatchPathPattern {
				..
			} => Value::Null(NullKind::BadType),
			Expression::Uuid => Value::String(uuid::Uuid::new_v4().to_string()),
			Expression::Parameter(name) => ctx.parameter(name).clone(),
		}
	}

	/// Encode this expression into its stable binary form.
	pub fn encode(&self) -> Result<Vec<u8>, Error> {
		let mut out = Vec::new();
		self.serialize_revisioned(&mut out)?;
		Ok(out)
	}

	/// Decode an expression, validating function arities.
	pub fn decode(mut bytes: &[u8]) -> Result<Expression, Error> {
		let expr = Expression::deserialize_revisioned(&mut bytes)?;
		expr.check()?;
		Ok(expr)
	}

	// Walk the tree rejecting unresolvable function calls.
	fn check(&self) -> Result<(), Error> {
		if let Expression::FunctionCall {
			name,
			args,
		} = self
		{
			fnc::check_arity(name, args.len())?;
		}
		for child in self.children() {
			child.check()?;
		}
		Ok(())
	}

	/// The direct children of this node, left to right.
	pub fn children(&self) -> Vec<&Expression> {
		match self {
			Expression::Constant(_)
			| Expression::VertexRef
			| Expression::EdgeRef
			| Expression::SrcProp {
				..
			}
			| Expression::DstProp {
				..
			}
			| Expression::EdgeProp {
				..
			}
			| Expression::Column(_)
			| Expression::InputProp(_)
			| Expression::VarProp {
				..
			}
			| Expression::MatchPathPattern {
				..
			}
			| Expression::Uuid
			| Expression::Parameter(_) => Vec::new(),
			Expression::Unary {
				expr,
				..
			}
			| Expression::TypeCast {
				expr,
				..
			}
			| Expression::Attribute {
				expr,
				..
			}
			| Expression::Aggregate {
				arg: expr,
				..
			} => vec![expr],
			Expression::Binary {
				left,
				right,
				..
			} => vec![left, right],
			Expression::Subscript {
				expr,
				index,
			} => vec![expr, index],
			Expression::Logical {
				operands,
				..
			} => operands.iter().collect(),
			Expression::ListLiteral(items)
			| Expression::SetLiteral(items)
			| Expression::PathBuild(items) => items.iter().collect(),
			Expression::MapLiteral(items) => items.iter().map(|e| &e.value).collect(),
			Expression::Case {
				selector,
				branches,
				default,
			} => {
				let mut out: Vec<&Expression> = Vec::new();
				if let Some(s) = selector {
					out.push(s);
				}
				for branch in branches {
					out.push(&branch.when);
					out.push(&branch.then);
				}
				if let Some(d) = default {
					out.push(d);
				}
				out
			}
			Expression::ListComprehension {
				input,
				filter,
				mapping,
				..
			} => {
				let mut out: Vec<&Expression> = vec![input];
				if let Some(f) = filter {
					out.push(f);
				}
				if let Some(m) = mapping {
					out.push(m);
				}
				out
			}
			Expression::Predicate {
				input,
				filter,
				..
			} => vec![input, filter],
			Expression::Reduce {
				init,
				input,
				mapping,
				..
			} => vec![init, input, mapping],
			Expression::FunctionCall {
				args,
				..
			} => args.iter().collect(),
		}
	}

	/// Does any node in this tree satisfy the probe?
	pub fn any(&self, probe: &dyn Fn(&Expression) -> bool) -> bool {
		if probe(self) {
			return true;
		}
		self.children().iter().any(|c| c.any(probe))
	}

	/// Does this tree contain an aggregate application?
	pub fn has_aggregate(&self) -> bool {
		self.any(&|e| {
			matches!(
				e,
				Expression::Aggregate {
					..
				}
			)
		})
	}
}

fn vertex_prop(v: &Value, tag: &str, prop: &str) -> Value {
	match v {
		Value::Vertex(vx) => {
			vx.prop(tag, prop).cloned().unwrap_or(Value::Null(NullKind::UnknownProp))
		}
		Value::Null(k) => Value::Null(*k),
		_ => Value::Null(NullKind::BadType),
	}
}

fn cast(target: CastType, v: &Value) -> Value {
	match (target, v) {
		(_, Value::Null(k)) => Value::Null(*k),
		(CastType::Int, Value::Int(i)) => Value::Int(*i),
		(CastType::Int, Value::Float(f)) => Value::Int(*f as i64),
		(CastType::Int, Value::String(s)) => match s.trim().parse::<i64>() {
			Ok(i) => Value::Int(i),
			Err(_) => Value::Null(NullKind::BadData),
		},
		(CastType::Int, Value::Bool(b)) => Value::Int(*b as i64),
		(CastType::Float, Value::Int(i)) => Value::Float(*i as f64),
		(CastType::Float, Value::Float(f)) => Value::Float(*f),
		(CastType::Float, Value::String(s)) => match s.trim().parse::<f64>() {
			Ok(f) => Value::Float(f),
			Err(_) => Value::Null(NullKind::BadData),
		},
		(CastType::String, v) => Value::String(v.to_string()),
		(CastType::Bool, Value::Bool(b)) => Value::Bool(*b),
		(CastType::Bool, Value::String(s)) => match s.to_lowercase().as_str() {
			"true" => Value::Bool(true),
			"false" => Value::Bool(false),
			_ => Value::Null(NullKind::BadData),
		},
		_ => Value::Null(NullKind::BadType),
	}
}

fn build_path(items: &[Expression], ctx: &dyn ExpressionContext) -> Value {
	use crate::val::{Path, Step, Vertex};
	let mut src: Option<Vertex> = None;
	let mut steps: Vec<Step> = Vec::new();
	let mut pending: Option<crate::val::Edge> = None;
	for item in items {
		match item.eval(ctx) {
			Value::Vertex(v) => match (&src, pending.take()) {
				(None, _) => src = Some(*v),
				(Some(_), Some(e)) => steps.push(Step {
					dst: *v,
					etype: e.etype,
					name: e.name,
					rank: e.rank,
					props: e.props,
				}),
				// A vertex with no connecting edge breaks the sequence
				(Some(_), None) => return Value::Null(NullKind::BadData),
			},
			Value::Edge(e) => pending = Some(*e),
			Value::Null(k) => return Value::Null(k),
			_ => return Value::Null(NullKind::BadType),
		}
	}
	match src {
		Some(src) => Value::Path(Box::new(Path {
			src,
			steps,
		})),
		None => Value::Null(NullKind::BadData),
	}
}

// Evaluating `all(...)` needs the input size; recompute it here rather
// than holding the items alive across the match above.
fn count_all(expr: &Expression, ctx: &dyn ExpressionContext) -> usize {
	if let Expression::Predicate {
		input,
		..
	} = expr
	{
		match input.eval(ctx) {
			Value::List(l) => l.len(),
			Value::Set(s) => s.len(),
			_ => 0,
		}
	} else {
		0
	}
}

// A scoped variable binding layered over a parent context.
struct Bind<'a> {
	parent: &'a dyn ExpressionContext,
	names: [&'a str; 2],
	values: [Value; 2],
	len: usize,
}

impl<'a> Bind<'a> {
	fn new(parent: &'a dyn ExpressionContext, name: &'a str, value: Value) -> Self {
		Self {
			parent,
			names: [name, ""],
			values: [value, Value::Empty],
			len: 1,
		}
	}

	fn new2(
		parent: &'a dyn ExpressionContext,
		n1: &'a str,
		v1: Value,
		n2: &'a str,
		v2: Value,
	) -> Self {
		Self {
			parent,
			names: [n1, n2],
			values: [v1, v2],
			len: 2,
		}
	}
}

impl ExpressionContext for Bind<'_> {
	fn input_column(&self, idx: usize) -> &Value {
		self.parent.input_column(idx)
	}

	fn input_prop(&self, name: &str) -> &Value {
		for i in 0..self.len {
			if self.names[i] == name {
				return &self.values[i];
			}
		}
		self.parent.input_prop(name)
	}

	fn src_vertex(&self) -> &Value {
		self.parent.src_vertex()
	}

	fn dst_vertex(&self) -> &Value {
		self.parent.dst_vertex()
	}

	fn edge(&self) -> &Value {
		self.parent.edge()
	}

	fn variable(&self, name: &str) -> &Value {
		for i in 0..self.len {
			if self.names[i] == name {
				return &self.values[i];
			}
		}
		self.parent.variable(name)
	}

	fn var_prop(&self, var: &str, name: &str) -> &Value {
		self.parent.var_prop(var, name)
	}

	fn parameter(&self, name: &str) -> &Value {
		self.parent.parameter(name)
	}

	fn session(&self, name: &str) -> &Value {
		self.parent.session(name)
	}
}

impl fmt::Display for Expression {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		match self {
			Expression::Constant(v) => write!(f, "{v}"),
			Expression::Unary {
				op,
				expr,
			} => match op {
				UnaryOp::Not => write!(f, "!({expr})"),
				UnaryOp::Negate => write!(f, "-({expr})"),
				UnaryOp::IsNull => write!(f, "({expr}) IS NULL"),
				UnaryOp::IsNotNull => write!(f, "({expr}) IS NOT NULL"),
			},
			Expression::Binary {
				left,
				op,
				right,
			} => {
				let op = match op {
					BinaryOp::Add => "+",
					BinaryOp::Subtract => "-",
					BinaryOp::Multiply => "*",
					BinaryOp::Divide => "/",
					BinaryOp::Modulo => "%",
					BinaryOp::Equal => "==",
					BinaryOp::NotEqual => "!=",
					BinaryOp::LessThan => "<",
					BinaryOp::LessThanOrEqual => "<=",
					BinaryOp::MoreThan => ">",
					BinaryOp::MoreThanOrEqual => ">=",
					BinaryOp::In => "IN",
					BinaryOp::Contains => "CONTAINS",
					BinaryOp::StartsWith => "STARTS WITH",
					BinaryOp::EndsWith => "ENDS WITH",
				};
				write!(f, "({left} {op} {right})")
			}
			Expression::Logical {
				op,
				operands,
			} => {
				let op = match op {
					LogicalOp::And => " AND ",
					LogicalOp::Or => " OR ",
					LogicalOp::Xor => " XOR ",
				};
				let parts: Vec<String> = operands.iter().map(|e| e.to_string()).collect();
				write!(f, "({})", parts.join(op))
			}
			Expression::TypeCast {
				target,
				expr,
			} => write!(f, "({target:?})({expr})"),
			Expression::Attribute {
				expr,
				name,
			} => write!(f, "{expr}.{name}"),
			Expression::Subscript {
				expr,
				index,
			} => write!(f, "{expr}[{index}]"),
			Expression::Case {
				selector,
				branches,
				default,
			} => {
				write!(f, "CASE")?;
				if let Some(s) = selector {
					write!(f, " {s}")?;
				}
				for branch in branches {
					write!(f, " WHEN {} THEN {}", branch.when, branch.then)?;
				}
				if let Some(d) = default {
					write!(f, " ELSE {d}")?;
				}
				write!(f, " END")
			}
			Expression::ListLiteral(items) => {
				let parts: Vec<String> = items.iter().map(|e| e.to_string()).collect();
				write!(f, "[{}]", parts.join(", "))
			}
			Expression::SetLiteral(items) => {
				let parts: Vec<String> = items.iter().map(|e| e.to_string()).collect();
				write!(f, "{{{}}}", parts.join(", "))
			}
			Expression::MapLiteral(items) => {
				let parts: Vec<String> =
					items.iter().map(|e| format!("{}: {}", e.key, e.value)).collect();
				write!(f, "{{{}}}", parts.join(", "))
			}
			Expression::ListComprehension {
				var,
				input,
				filter,
				mapping,
			} => {
				write!(f, "[{var} IN {input}")?;
				if let Some(x) = filter {
					write!(f, " WHERE {x}")?;
				}
				if let Some(m) = mapping {
					write!(f, " | {m}")?;
				}
				write!(f, "]")
			}
			Expression::Predicate {
				kind,
				var,
				input,
				filter,
			} => {
				let kind = match kind {
					PredicateKind::All => "all",
					PredicateKind::Any => "any",
					PredicateKind::None => "none",
					PredicateKind::Single => "single",
				};
				write!(f, "{kind}({var} IN {input} WHERE {filter})")
			}
			Expression::Reduce {
				acc,
				init,
				var,
				input,
				mapping,
			} => write!(f, "reduce({acc} = {init}, {var} IN {input} | {mapping})"),
			Expression::FunctionCall {
				name,
				args,
			} => {
				let parts: Vec<String> = args.iter().map(|e| e.to_string()).collect();
				write!(f, "{name}({})", parts.join(", "))
			}
			Expression::Aggregate {
				kind,
				distinct,
				arg,
			} => {
				let kind = format!("{kind:?}").to_lowercase();
				if *distinct {
					write!(f, "{kind}(DISTINCT {arg})")
				} else {
					write!(f, "{kind}({arg})")
				}
			}
			Expression::VertexRef => write!(f, "VERTEX"),
			Expression::EdgeRef => write!(f, "EDGE"),
			Expression::SrcProp {
				tag,
				prop,
			} => write!(f, "$^.{tag}.{prop}"),
			Expression::DstProp {
				tag,
				prop,
			} => write!(f, "$$.{tag}.{prop}"),
			Expression::EdgeProp {
				prop,
			} => write!(f, "EDGE.{prop}"),
			Expression::Column(idx) => write!(f, "$-.{idx}"),
			Expression::InputProp(name) => write!(f, "$-.{name}"),
			Expression::VarProp {
				var,
				prop,
			} => write!(f, "${var}.{prop}"),
			Expression::PathBuild(items) => {
				let parts: Vec<String> = items.iter().map(|e| e.to_string()).collect();
				write!(f, "PATH({})", parts.join(", "))
			}
			Expression::MatchPathPattern {
				aliases,
			} => write!(f, "PATTERN({})", aliases.join(", ")),
			Expression::Uuid => write!(f, "uuid()"),
			Expression::Parameter(name) => write!(f, "${name}"),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn binary_short_circuit() {
		let e = Expression::Logical {
			op: LogicalOp::And,
			operands: vec![
				Expression::constant(false),
				// Would be a type error if evaluated strictly
				Expression::binary(
					Expression::constant(1i64),
					BinaryOp::Divide,
					Expression::constant(0i64),
				),
			],
		};
		assert_eq!(e.eval(&EmptyContext), Value::Bool(false));
	}

	#[test]
	fn case_with_selector() {
		let e = Expression::Case {
			selector: Some(Box::new(Expression::constant(2i64))),
			branches: vec![
				CaseBranch {
					when: Expression::constant(1i64),
					then: Expression::constant("one"),
				},
				CaseBranch {
					when: Expression::constant(2i64),
					then: Expression::constant("two"),
				},
			],
			default: Some(Box::new(Expression::constant("other"))),
		};
		assert_eq!(e.eval(&EmptyContext), "two".into());
	}

	#[test]
	fn list_comprehension_filters_and_maps() {
		let e = Expression::ListComprehension {
			var: "x".into(),
			input: Box::new(Expression::ListLiteral(vec![
				Expression::constant(1i64),
				Expression::constant(2i64),
				Expression::constant(3i64),
			])),
			filter: Some(Box::new(Expression::binary(
				Expression::InputProp("x".into()),
				BinaryOp::MoreThan,
				Expression::constant(1i64),
			))),
			mapping: Some(Box::new(Expression::binary(
				Expression::InputProp("x".into()),
				BinaryOp::Multiply,
				Expression::constant(10i64),
			))),
		};
		assert_eq!(e.eval(&EmptyContext), Value::List(vec![Value::Int(20), Value::Int(30)]));
	}

	#[test]
	fn reduce_accumulates() {
		let e = Expression::Reduce {
			acc: "acc".into(),
			init: Box::new(Expression::constant(0i64)),
			var: "x".into(),
			input: Box::new(Expression::ListLiteral(vec![
				Expression::constant(1i64),
				Expression::constant(2i64),
				Expression::constant(3i64),
			])),
			mapping: Box::new(Expression::binary(
				Expression::InputProp("acc".into()),
				BinaryOp::Add,
				Expression::InputProp("x".into()),
			)),
		};
		assert_eq!(e.eval(&EmptyContext), Value::Int(6));
	}

	#[test]
	fn encode_decode_round_trip() {
		let e = Expression::binary(
			Expression::DstProp {
				tag: "person".into(),
				prop: "age".into(),
			},
			BinaryOp::MoreThanOrEqual,
			Expression::constant(10i64),
		);
		let bytes = e.encode().unwrap();
		let back = Expression::decode(&bytes).unwrap();
		assert_eq!(e, back);
	}

	#[test]
	fn decode_rejects_bad_arity() {
		let e = Expression::FunctionCall {
			name: "size".into(),
			args: vec![],
		};
		let bytes = e.encode().unwrap();
		assert!(Expression::decode(&bytes).is_err());
	}
}
