use crate::expr::{Expr, LiteralValue};
use crate::stmt::{FunctionDecl, Stmt};

/// Renders the AST as parenthesised prefix notation, e.g. `(* (- 123.0) (group 45.67))`.
pub struct AstPrinter;

impl AstPrinter {
    pub fn print(&self, expr: &Expr) -> String {
        match expr {
            Expr::Assign { name, value, .. } => {
                format!("(= {} {})", name.lexeme, self.print(value))
            }

            Expr::Binary {
                left,
                operator,
                right,
            }
            | Expr::Logical {
                left,
                operator,
                right,
            } => format!(
                "({} {} {})",
                operator.lexeme,
                self.print(left),
                self.print(right)
            ),

            Expr::Call {
                callee, arguments, ..
            } => {
                let mut parts: Vec<String> = vec![self.print(callee)];
                parts.extend(arguments.iter().map(|arg| self.print(arg)));

                format!("(call {})", parts.join(" "))
            }

            Expr::Get { object, name } => format!("(. {} {})", self.print(object), name.lexeme),

            Expr::Grouping(inner) => format!("(group {})", self.print(inner)),

            Expr::Literal(literal) => match literal {
                LiteralValue::Number(n) => {
                    if n.fract() == 0.0 {
                        format!("{:.1}", n)
                    } else {
                        n.to_string()
                    }
                }

                LiteralValue::Str(s) => s.to_string(),

                LiteralValue::True => "true".to_string(),

                LiteralValue::False => "false".to_string(),

                LiteralValue::Nil => "nil".to_string(),
            },

            Expr::Set {
                object,
                name,
                value,
            } => format!(
                "(= (. {} {}) {})",
                self.print(object),
                name.lexeme,
                self.print(value)
            ),

            Expr::Super { method, .. } => format!("(super {})", method.lexeme),

            Expr::This { .. } => "this".to_string(),

            Expr::Unary { operator, right } => {
                format!("({} {})", operator.lexeme, self.print(right))
            }

            Expr::Variable { name, .. } => name.lexeme.to_string(),
        }
    }

    pub fn print_stmt(&self, stmt: &Stmt) -> String {
        match stmt {
            Stmt::Block(statements) => {
                if statements.is_empty() {
                    return "(block)".to_string();
                }

                let body: Vec<String> = statements.iter().map(|s| self.print_stmt(s)).collect();

                format!("(block {})", body.join(" "))
            }

            Stmt::Class(decl) => {
                let mut head: String = format!("(class {}", decl.name.lexeme);

                if let Some(superclass) = &decl.superclass {
                    head.push_str(&format!(" < {}", self.print(superclass)));
                }

                for method in &decl.methods {
                    head.push(' ');
                    head.push_str(&self.print_function(&method.name.lexeme, method));
                }

                head.push(')');
                head
            }

            Stmt::Expression(expr) => format!("(; {})", self.print(expr)),

            Stmt::Function(decl) => self.print_function(&decl.name.lexeme, decl),

            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => match else_branch {
                Some(else_branch) => format!(
                    "(if-else {} {} {})",
                    self.print(condition),
                    self.print_stmt(then_branch),
                    self.print_stmt(else_branch)
                ),
                None => format!(
                    "(if {} {})",
                    self.print(condition),
                    self.print_stmt(then_branch)
                ),
            },

            Stmt::Print(expr) => format!("(print {})", self.print(expr)),

            Stmt::Return { value, .. } => match value {
                Some(expr) => format!("(return {})", self.print(expr)),
                None => "(return)".to_string(),
            },

            Stmt::Var { name, initializer } => match initializer {
                Some(expr) => format!("(var {} = {})", name.lexeme, self.print(expr)),
                None => format!("(var {})", name.lexeme),
            },

            Stmt::While { condition, body } => {
                format!("(while {} {})", self.print(condition), self.print_stmt(body))
            }
        }
    }

    fn print_function(&self, name: &str, decl: &FunctionDecl) -> String {
        let params: Vec<&str> = decl.params.iter().map(|p| p.lexeme.as_str()).collect();
        let body: Vec<String> = decl.body.iter().map(|s| self.print_stmt(s)).collect();

        format!("(fun {}({}) {})", name, params.join(" "), body.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Diagnostics;
    use crate::parser::Parser;
    use crate::scanner::scan;

    fn print_expression(source: &str) -> String {
        let mut diagnostics = Diagnostics::new();
        let tokens = scan(source, &mut diagnostics);
        let expr = Parser::new(tokens)
            .parse_expression(&mut diagnostics)
            .expect("expression should parse");

        AstPrinter.print(&expr)
    }

    #[test]
    fn precedence_is_visible() {
        assert_eq!(print_expression("1 + 2 * 3"), "(+ 1.0 (* 2.0 3.0))");
        assert_eq!(print_expression("(1 + 2) * 3"), "(* (group (+ 1.0 2.0)) 3.0)");
        assert_eq!(print_expression("-123 * (45.67)"), "(* (- 123.0) (group 45.67))");
    }

    #[test]
    fn calls_and_properties() {
        assert_eq!(print_expression("a.b(c)()"), "(call (call (. a b) c))");
        assert_eq!(print_expression("a.b = c or d"), "(= (. a b) (or c d))");
    }

    #[test]
    fn statements() {
        let mut diagnostics = Diagnostics::new();
        let tokens = scan("while (x) { print x; }", &mut diagnostics);
        let statements = Parser::new(tokens).parse(&mut diagnostics);

        assert_eq!(
            AstPrinter.print_stmt(&statements[0]),
            "(while x (block (print x)))"
        );
    }
}
