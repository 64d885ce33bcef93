use crate::exp::Expression;

/// Read-only traversal over an expression tree.
///
/// The default implementation visits children left to right; an
/// implementor overrides [`Visitor::visit`] and calls [`walk`] to
/// continue downwards. Visitors accumulate into their own state and do
/// not mutate the tree.
pub trait Visitor {
	fn visit(&mut self, expr: &Expression) {
		walk(self, expr);
	}
}

/// Visit the children of `expr` left to right.
pub fn walk<V: Visitor + ?Sized>(visitor: &mut V, expr: &Expression) {
	for child in expr.children() {
		visitor.visit(child);
	}
}

/// A bottom-up rewriter: each node may be replaced after its children
/// have been rewritten. Returning `None` keeps the node.
pub trait Rewriter {
	fn rewrite(&mut self, expr: &Expression) -> Option<Expression>;
}

/// Apply a rewriter over a tree, bottom up.
pub fn rewrite<R: Rewriter + ?Sized>(rewriter: &mut R, expr: &Expression) -> Expression {
	let rebuilt = map_children(expr, &mut |child| rewrite(rewriter, child));
	match rewriter.rewrite(&rebuilt) {
		Some(replacement) => replacement,
		None => rebuilt,
	}
}

// Rebuild a node with each child passed through `f`.
fn map_children(expr: &Expression, f: &mut impl FnMut(&Expression) -> Expression) -> Expression {
	use Expression::*;
	match expr {
		Unary {
			op,
			expr,
		} => Unary {
			op: *op,
			expr: Box::new(f(expr)),
		},
		Binary {
			left,
			op,
			right,
		} => Binary {
			left: Box::new(f(left)),
			op: *op,
			right: Box::new(f(right)),
		},
		Logical {
			op,
			operands,
		} => Logical {
			op: *op,
			operands: operands.iter().map(&mut *f).collect(),
		},
		TypeCast {
			target,
			expr,
		} => TypeCast {
			target: *target,
			expr: Box::new(f(expr)),
		},
		Attribute {
			expr,
			name,
		} => Attribute {
			expr: Box::new(f(expr)),
			name: name.clone(),
		},
		Subscript {
			expr,
			index,
		} => Subscript {
			expr: Box::new(f(expr)),
			index: Box::new(f(index)),
		},
		Case {
			selector,
			branches,
			default,
		} => Case {
			selector: selector.as_ref().map(|s| Box::new(f(s))),
			branches: branches
				.iter()
				.map(|b| crate::exp::CaseBranch {
					when: f(&b.when),
					then: f(&b.then),
				})
				.collect(),
			default: default.as_ref().map(|d| Box::new(f(d))),
		},
		ListLiteral(items) => ListLiteral(items.iter().map(&mut *f).collect()),
		SetLiteral(items) => SetLiteral(items.iter().map(&mut *f).collect()),
		MapLiteral(items) => MapLiteral(
			items
				.iter()
				.map(|e| crate::exp::MapEntry {
					key: e.key.clone(),
					value: f(&e.value),
				})
				.collect(),
		),
		ListComprehension {
			var,
			input,
			filter,
			mapping,
		} => ListComprehension {
			var: var.clone(),
			input: Box::new(f(input)),
			filter: filter.as_ref().map(|x| Box::new(f(x))),
			mapping: mapping.as_ref().map(|m| Box::new(f(m))),
		},
		Predicate {
			kind,
			var,
			input,
			filter,
		} => Predicate {
			kind: *kind,
			var: var.clone(),
			input: Box::new(f(input)),
			filter: Box::new(f(filter)),
		},
		Reduce {
			acc,
			init,
			var,
			input,
			mapping,
		} => Reduce {
			acc: acc.clone(),
			init: Box::new(f(init)),
			var: var.clone(),
			input: Box::new(f(input)),
			mapping: Box::new(f(mapping)),
		},
		FunctionCall {
			name,
			args,
		} => FunctionCall {
			name: name.clone(),
			args: args.iter().map(&mut *f).collect(),
		},
		Aggregate {
			kind,
			distinct,
			arg,
		} => Aggregate {
			kind: *kind,
			distinct: *distinct,
			arg: Box::new(f(arg)),
		},
		PathBuild(items) => PathBuild(items.iter().map(&mut *f).collect()),
		leaf => leaf.clone(),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::exp::{BinaryOp, EmptyContext};
	use crate::val::Value;

	struct CountConstants(usize);

	impl Visitor for CountConstants {
		fn visit(&mut self, expr: &Expression) {
			if matches!(expr, Expression::Constant(_)) {
				self.0 += 1;
			}
			walk(self, expr);
		}
	}

	#[test]
	fn visitor_counts_leaves() {
		let e = Expression::binary(
			Expression::constant(1i64),
			BinaryOp::Add,
			Expression::binary(Expression::constant(2i64), BinaryOp::Add, Expression::constant(3i64)),
		);
		let mut v = CountConstants(0);
		v.visit(&e);
		assert_eq!(v.0, 3);
	}

	struct FoldParams;

	impl Rewriter for FoldParams {
		fn rewrite(&mut self, expr: &Expression) -> Option<Expression> {
			match expr {
				Expression::Parameter(_) => Some(Expression::constant(7i64)),
				_ => None,
			}
		}
	}

	#[test]
	fn rewriter_replaces_bottom_up() {
		let e = Expression::binary(
			Expression::Parameter("a".into()),
			BinaryOp::Add,
			Expression::Parameter("b".into()),
		);
		let out = rewrite(&mut FoldParams, &e);
		assert_eq!(out.eval(&EmptyContext), Value::Int(14));
	}
}
