//! Expression re-emission: turns binding/handler expression trees into
//! generated code, resolving bare identifier reads against the template
//! scope and recording a mapping for every re-emitted region.

use crate::emit::{Expression, ExpressionBuilder, MAP_FULL, MAP_NAV};
use crate::tcb::{escape_literal, is_js_identifier, Renderer, ANY_EXPRESSION, EVENT_PARAMETER};
use source_map::Span;
use template_ast::{EntityId, Expr, Node, ObjectEntry, TemplateEntity};

/// How identifier reads are treated during emission.
pub(crate) enum ExprMode<'m> {
    Normal,
    /// Inside an event-handler body: `$event` resolves to the handler
    /// parameter, and `@let` reads are allowed before their declaration.
    EventHandler,
    /// Inside a `track` expression: template symbols other than the
    /// allowed loop variables are reported.
    ForTrack { allowed: &'m [EntityId] },
}

impl Renderer<'_, '_> {
    /// Converts an expression into generated code, resolving identifiers
    /// in the given render scope. `None` emits `undefined`.
    pub(crate) fn tcb_expression(&mut self, expr: Option<&Expr>, scope: usize) -> Expression {
        let mut builder = ExpressionBuilder::new();
        match expr {
            Some(expr) => self.emit_expr(expr, scope, &mut builder, &ExprMode::Normal),
            None => {
                builder.append("undefined");
            }
        }
        builder.finish()
    }

    /// Like [`Self::tcb_expression`], with `$event` resolving to the
    /// handler parameter.
    pub(crate) fn tcb_handler_expression(&mut self, expr: &Expr, scope: usize) -> Expression {
        let mut builder = ExpressionBuilder::new();
        self.emit_expr(expr, scope, &mut builder, &ExprMode::EventHandler);
        builder.finish()
    }

    pub(crate) fn emit_expr(
        &mut self,
        expr: &Expr,
        scope: usize,
        b: &mut ExpressionBuilder,
        mode: &ExprMode<'_>,
    ) {
        match expr {
            Expr::PropertyRead {
                receiver: None,
                name,
                span,
                ..
            } => self.emit_implicit_read(name, *span, scope, b, mode),
            Expr::PropertyRead {
                receiver: Some(receiver),
                name,
                name_span,
                span,
                safe,
            } => {
                let start = b.offset();
                if *safe {
                    if self.env.config.strict_safe_navigation_types {
                        // The ternary types as `T | undefined`, which is
                        // exactly what a safe read produces.
                        b.append(&format!("({ANY_EXPRESSION} ? ("));
                        self.emit_expr(receiver, scope, b, mode);
                        b.append(")!.");
                        b.append_mapped(name, Some(*name_span), MAP_FULL);
                        b.append(" : undefined)");
                    } else {
                        b.append("((");
                        self.emit_expr(receiver, scope, b, mode);
                        b.append(")!.");
                        b.append_mapped(name, Some(*name_span), MAP_FULL);
                        b.append(" as any)");
                    }
                } else {
                    self.emit_expr(receiver, scope, b, mode);
                    b.append(".");
                    b.append_mapped(name, Some(*name_span), MAP_FULL);
                }
                b.map_from(start, *span, MAP_FULL);
            }
            Expr::KeyedRead {
                receiver,
                key,
                span,
                safe,
            } => {
                let start = b.offset();
                if *safe {
                    if self.env.config.strict_safe_navigation_types {
                        b.append(&format!("({ANY_EXPRESSION} ? ("));
                        self.emit_expr(receiver, scope, b, mode);
                        b.append(")![");
                        self.emit_expr(key, scope, b, mode);
                        b.append("] : undefined)");
                    } else {
                        b.append("((");
                        self.emit_expr(receiver, scope, b, mode);
                        b.append(")![");
                        self.emit_expr(key, scope, b, mode);
                        b.append("] as any)");
                    }
                } else {
                    self.emit_expr(receiver, scope, b, mode);
                    b.append("[");
                    self.emit_expr(key, scope, b, mode);
                    b.append("]");
                }
                b.map_from(start, *span, MAP_FULL);
            }
            Expr::Call {
                callee,
                args,
                span,
                safe,
            } => {
                // `$any(expr)` casts its argument and disappears.
                if let Expr::PropertyRead {
                    receiver: None,
                    name,
                    ..
                } = callee.as_ref()
                {
                    if name == "$any" && args.len() == 1 {
                        b.append("(");
                        self.emit_expr(&args[0], scope, b, mode);
                        b.append(" as any)");
                        return;
                    }
                }
                let start = b.offset();
                let method_safe = *safe || is_safe_access(callee);
                if method_safe {
                    if self.env.config.strict_safe_navigation_types {
                        b.append(&format!("({ANY_EXPRESSION} ? ("));
                        self.emit_expr(callee, scope, b, mode);
                        b.append(")!(");
                        self.emit_args(args, scope, b, mode);
                        b.append(") : undefined)");
                    } else {
                        b.append("((");
                        self.emit_expr(callee, scope, b, mode);
                        b.append(")!(");
                        self.emit_args(args, scope, b, mode);
                        b.append(") as any)");
                    }
                } else {
                    self.emit_expr(callee, scope, b, mode);
                    b.append("(");
                    self.emit_args(args, scope, b, mode);
                    b.append(")");
                }
                b.map_from(start, *span, MAP_FULL);
            }
            Expr::Pipe {
                input,
                name,
                name_span,
                args,
                span,
            } => {
                let start = b.offset();
                let check_pipes = self.env.config.check_type_of_pipes;
                let alias = self.bound.pipe_by_name(name).map(|p| self.env.pipe_instance(p));
                if !check_pipes {
                    b.append("(");
                }
                match alias {
                    Some(alias) => {
                        b.append(&alias.name);
                    }
                    None => {
                        self.oob.missing_pipe(name, Some(*name_span));
                        // Keep checking the rest of the expression.
                        b.append(&format!("({ANY_EXPRESSION})"));
                    }
                }
                b.append(".");
                b.append_mapped("transform", Some(*name_span), MAP_FULL);
                if !check_pipes {
                    b.append(" as any)");
                }
                b.append("(");
                self.emit_expr(input, scope, b, mode);
                for arg in args {
                    b.append(", ");
                    self.emit_expr(arg, scope, b, mode);
                }
                b.append(")");
                b.map_from(start, *span, MAP_FULL);
            }
            Expr::Literal { text, span } => {
                b.append_mapped(text, Some(*span), MAP_FULL);
            }
            Expr::StringLiteral { text, span } => {
                b.append_mapped(text, Some(*span), MAP_FULL);
            }
            Expr::ArrayLiteral { elements, span } => {
                let strict = self.env.config.strict_literal_types;
                if !strict {
                    b.append("(");
                }
                let start = b.offset();
                b.append("[");
                for (i, element) in elements.iter().enumerate() {
                    if i > 0 {
                        b.append(", ");
                    }
                    self.emit_expr(element, scope, b, mode);
                }
                b.append("]");
                b.map_from(start, *span, MAP_FULL);
                if !strict {
                    b.append(" as any)");
                }
            }
            Expr::ObjectLiteral { entries, span } => {
                let strict = self.env.config.strict_literal_types;
                if !strict {
                    b.append("(");
                }
                let start = b.offset();
                b.append("{");
                for (i, entry) in entries.iter().enumerate() {
                    if i > 0 {
                        b.append(", ");
                    }
                    self.emit_object_entry(entry, scope, b, mode);
                }
                b.append("}");
                b.map_from(start, *span, MAP_FULL);
                if !strict {
                    b.append(" as any)");
                }
            }
            Expr::Binary { op, lhs, rhs, span } => {
                let start = b.offset();
                self.emit_expr(lhs, scope, b, mode);
                b.append(&format!(" {op} "));
                self.emit_expr(rhs, scope, b, mode);
                b.map_from(start, *span, MAP_FULL);
            }
            Expr::Unary { op, operand, span } => {
                let start = b.offset();
                b.append(op);
                self.emit_expr(operand, scope, b, mode);
                b.map_from(start, *span, MAP_FULL);
            }
            Expr::Conditional {
                condition,
                then_expr,
                else_expr,
                span,
            } => {
                let start = b.offset();
                self.emit_expr(condition, scope, b, mode);
                b.append(" ? ");
                self.emit_expr(then_expr, scope, b, mode);
                b.append(" : ");
                self.emit_expr(else_expr, scope, b, mode);
                b.map_from(start, *span, MAP_FULL);
            }
            Expr::Assignment {
                target,
                value,
                span,
            } => {
                let start = b.offset();
                let let_write = target.as_implicit_read().and_then(|name| {
                    let binder_scope = self.scopes[scope].binder_scope;
                    match self.bound.expression_target(name, binder_scope) {
                        Some(TemplateEntity::Let { .. }) => Some(name.clone()),
                        _ => None,
                    }
                });
                match let_write {
                    Some(name) => {
                        // Writes to `@let` are reported out-of-band; the
                        // checker's own error would name the synthetic
                        // variable.
                        self.oob.illegal_write_to_let(&name, Some(target.span()));
                        let mut target_builder = ExpressionBuilder::new();
                        self.emit_expr(target, scope, &mut target_builder, mode);
                        let target_expr = target_builder.finish();
                        b.with_ignore_diagnostics(|b| {
                            b.append_expr(&target_expr);
                        });
                    }
                    None => self.emit_expr(target, scope, b, mode),
                }
                b.append(" = ");
                self.emit_expr(value, scope, b, mode);
                b.map_from(start, *span, MAP_FULL);
            }
            Expr::NonNull { inner, span } => {
                let start = b.offset();
                self.emit_expr(inner, scope, b, mode);
                b.append("!");
                b.map_from(start, *span, MAP_FULL);
            }
            Expr::Paren { inner, span } => {
                let start = b.offset();
                b.append("(");
                self.emit_expr(inner, scope, b, mode);
                b.append(")");
                b.map_from(start, *span, MAP_FULL);
            }
            Expr::This { span } => {
                b.append_mapped("this", Some(*span), MAP_FULL);
            }
        }
    }

    /// A bare identifier read: resolve against template scope, fall back
    /// to a component member access.
    fn emit_implicit_read(
        &mut self,
        name: &str,
        span: Span,
        scope: usize,
        b: &mut ExpressionBuilder,
        mode: &ExprMode<'_>,
    ) {
        if matches!(mode, ExprMode::EventHandler) && name == EVENT_PARAMETER {
            // The handler parameter shadows everything else.
            b.append_mapped(EVENT_PARAMETER, Some(span), MAP_FULL);
            return;
        }

        let binder_scope = self.scopes[scope].binder_scope;
        let target = self.bound.expression_target(name, binder_scope);

        if let ExprMode::ForTrack { allowed } = mode {
            if let Some(entity) = &target {
                let permitted = matches!(entity, TemplateEntity::Variable { .. })
                    && allowed.contains(&entity.id());
                if !permitted {
                    self.oob.illegal_track_access(name, Some(span));
                }
            }
        }

        let Some(entity) = target else {
            self.emit_component_read(name, span, b);
            return;
        };
        let Some(id) = self.resolve_entity(scope, entity.id()) else {
            self.emit_component_read(name, span, b);
            return;
        };

        if let TemplateEntity::Let { node, .. } = entity {
            // Event handlers run later, so they may read a `@let` that is
            // declared further down.
            let valid = matches!(mode, ExprMode::EventHandler)
                || self.is_valid_let_access(scope, &entity, node, span);
            if !valid {
                self.oob.let_used_before_definition(name, Some(span));
                b.append("(");
                b.append_identifier(&id, Some(span), MAP_FULL);
                b.append(" as any)");
                return;
            }
        }
        b.append_identifier(&id, Some(span), MAP_FULL);
    }

    fn emit_component_read(&mut self, name: &str, span: Span, b: &mut ExpressionBuilder) {
        let start = b.offset();
        b.append("this.");
        b.append_mapped(name, Some(span), MAP_NAV);
        b.map_from(start, span, MAP_FULL);
    }

    fn emit_object_entry(
        &mut self,
        entry: &ObjectEntry,
        scope: usize,
        b: &mut ExpressionBuilder,
        mode: &ExprMode<'_>,
    ) {
        if is_js_identifier(&entry.key) {
            b.append_mapped(&entry.key, entry.key_span, MAP_FULL);
        } else {
            b.append("\"");
            b.append_mapped(&escape_literal(&entry.key), entry.key_span, MAP_FULL);
            b.append("\"");
        }
        b.append(": ");
        self.emit_expr(&entry.value, scope, b, mode);
    }

    fn emit_args(
        &mut self,
        args: &[Expr],
        scope: usize,
        b: &mut ExpressionBuilder,
        mode: &ExprMode<'_>,
    ) {
        for (i, arg) in args.iter().enumerate() {
            if i > 0 {
                b.append(", ");
            }
            self.emit_expr(arg, scope, b, mode);
        }
    }

    /// Embedded views update before their parents, so only reads that
    /// start after the declaration's end are flagged, and only when the
    /// declaration lives in the reading scope.
    fn is_valid_let_access(
        &self,
        scope: usize,
        entity: &TemplateEntity,
        let_node: template_ast::NodeId,
        read_span: Span,
    ) -> bool {
        let ast = self.bound.ast();
        let Node::Let(block) = ast.node(let_node) else {
            return true;
        };
        let Some(decl) = &block.declaration else {
            return true;
        };
        let declared_before =
            decl.source_span.start < read_span.start && read_span.start > decl.source_span.end;
        declared_before || !self.is_local_entity(scope, entity.id())
    }
}

fn is_safe_access(expr: &Expr) -> bool {
    matches!(
        expr,
        Expr::PropertyRead { safe: true, .. } | Expr::KeyedRead { safe: true, .. }
    )
}
