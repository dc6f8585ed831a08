use crate::html::NodeId;
use crate::xpath::ast::Expr;
use crate::xpath::eval::{into_document_order, Context, Evaluator};
use crate::xpath::value::{is_xml_whitespace, Value};
use crate::xpath::XPathError;
use paste::paste;
use std::ops::RangeInclusive;

/// Declares the core function library: each XPath name dispatches to the `fn_`-prefixed method of the same name.
macro_rules! function_library {
    ($($xpath_name:literal => $name:ident,)*) => {
        impl Evaluator<'_> {
            pub(crate) fn call_function(&self, name: &str, args: &[Expr], ctx: &Context) -> Result<Value, XPathError> {
                paste! {
                    match name {
                        $($xpath_name => self.[<fn_ $name>](args, ctx),)*
                        _ => Err(XPathError::UnknownFunction { name: name.to_string() }),
                    }
                }
            }
        }
    };
}

function_library! {
    "last" => last,
    "position" => position,
    "count" => count,
    "id" => id,
    "local-name" => local_name,
    "namespace-uri" => namespace_uri,
    "name" => name,
    "string" => string,
    "concat" => concat,
    "starts-with" => starts_with,
    "contains" => contains,
    "substring-before" => substring_before,
    "substring-after" => substring_after,
    "substring" => substring,
    "string-length" => string_length,
    "normalize-space" => normalize_space,
    "translate" => translate,
    "boolean" => boolean,
    "not" => not,
    "true" => true_value,
    "false" => false_value,
    "lang" => lang,
    "number" => number,
    "sum" => sum,
    "floor" => floor,
    "ceiling" => ceiling,
    "round" => round,
}

fn arity(function: &'static str, args: &[Expr], allowed: RangeInclusive<usize>) -> Result<(), XPathError> {
    if allowed.contains(&args.len()) {
        Ok(())
    } else {
        Err(XPathError::ArgumentCount {
            function,
            found: args.len(),
        })
    }
}

impl Evaluator<'_> {
    fn string_arg(&self, args: &[Expr], index: usize, ctx: &Context) -> Result<String, XPathError> {
        Ok(self.eval(&args[index], ctx)?.to_xpath_string(self.doc))
    }

    fn number_arg(&self, args: &[Expr], index: usize, ctx: &Context) -> Result<f64, XPathError> {
        Ok(self.eval(&args[index], ctx)?.to_number(self.doc))
    }

    /// The string argument at `index`, or the context node's string-value if there are no arguments.
    fn string_arg_or_context(&self, args: &[Expr], ctx: &Context) -> Result<String, XPathError> {
        match args.first() {
            Some(_) => self.string_arg(args, 0, ctx),
            None => Ok(self.doc.string_value(ctx.node)),
        }
    }

    /// The first node of the node-set argument, or the context node if there are no arguments.
    fn node_arg_or_context(
        &self,
        function: &'static str,
        args: &[Expr],
        ctx: &Context,
    ) -> Result<Option<NodeId>, XPathError> {
        arity(function, args, 0..=1)?;
        match args.first() {
            Some(arg) => Ok(self.eval_node_set(arg, ctx, "the argument")?.first().copied()),
            None => Ok(Some(ctx.node)),
        }
    }

    fn fn_last(&self, args: &[Expr], ctx: &Context) -> Result<Value, XPathError> {
        arity("last", args, 0..=0)?;
        Ok(Value::Number(ctx.size as f64))
    }

    fn fn_position(&self, args: &[Expr], ctx: &Context) -> Result<Value, XPathError> {
        arity("position", args, 0..=0)?;
        Ok(Value::Number(ctx.position as f64))
    }

    fn fn_count(&self, args: &[Expr], ctx: &Context) -> Result<Value, XPathError> {
        arity("count", args, 1..=1)?;
        let nodes = self.eval_node_set(&args[0], ctx, "the argument to count()")?;
        Ok(Value::Number(nodes.len() as f64))
    }

    /// Elements whose `id` attribute is one of the whitespace-separated tokens of the argument.
    fn fn_id(&self, args: &[Expr], ctx: &Context) -> Result<Value, XPathError> {
        arity("id", args, 1..=1)?;
        let tokens: Vec<String> = match self.eval(&args[0], ctx)? {
            Value::NodeSet(nodes) => nodes.iter().map(|&node| self.doc.string_value(node)).collect(),
            other => vec![other.to_xpath_string(self.doc)],
        };
        let wanted: Vec<&str> = tokens
            .iter()
            .flat_map(|token| token.split(is_xml_whitespace))
            .filter(|token| !token.is_empty())
            .collect();
        let found = self
            .doc
            .descendants(self.doc.root())
            .filter(|&node| self.doc.attribute(node, "id").is_some_and(|id| wanted.contains(&id)))
            .collect();
        Ok(Value::NodeSet(into_document_order(found)))
    }

    fn fn_local_name(&self, args: &[Expr], ctx: &Context) -> Result<Value, XPathError> {
        let name = self.qualified_name(self.node_arg_or_context("local-name", args, ctx)?);
        let local = match name.split_once(':') {
            Some((_, local)) => local.to_string(),
            None => name,
        };
        Ok(Value::String(local))
    }

    /// Namespaces are not tracked, so this is always empty.
    fn fn_namespace_uri(&self, args: &[Expr], ctx: &Context) -> Result<Value, XPathError> {
        self.node_arg_or_context("namespace-uri", args, ctx)?;
        Ok(Value::String(String::new()))
    }

    fn fn_name(&self, args: &[Expr], ctx: &Context) -> Result<Value, XPathError> {
        let node = self.node_arg_or_context("name", args, ctx)?;
        Ok(Value::String(self.qualified_name(node)))
    }

    fn qualified_name(&self, node: Option<NodeId>) -> String {
        node.and_then(|node| self.doc.name(node)).unwrap_or_default().to_string()
    }

    fn fn_string(&self, args: &[Expr], ctx: &Context) -> Result<Value, XPathError> {
        arity("string", args, 0..=1)?;
        self.string_arg_or_context(args, ctx).map(Value::String)
    }

    fn fn_concat(&self, args: &[Expr], ctx: &Context) -> Result<Value, XPathError> {
        arity("concat", args, 2..=usize::MAX)?;
        let mut result = String::new();
        for index in 0..args.len() {
            result.push_str(&self.string_arg(args, index, ctx)?);
        }
        Ok(Value::String(result))
    }

    fn fn_starts_with(&self, args: &[Expr], ctx: &Context) -> Result<Value, XPathError> {
        arity("starts-with", args, 2..=2)?;
        let (haystack, needle) = (self.string_arg(args, 0, ctx)?, self.string_arg(args, 1, ctx)?);
        Ok(Value::Boolean(haystack.starts_with(&needle)))
    }

    fn fn_contains(&self, args: &[Expr], ctx: &Context) -> Result<Value, XPathError> {
        arity("contains", args, 2..=2)?;
        let (haystack, needle) = (self.string_arg(args, 0, ctx)?, self.string_arg(args, 1, ctx)?);
        Ok(Value::Boolean(haystack.contains(&needle)))
    }

    fn fn_substring_before(&self, args: &[Expr], ctx: &Context) -> Result<Value, XPathError> {
        arity("substring-before", args, 2..=2)?;
        let (haystack, needle) = (self.string_arg(args, 0, ctx)?, self.string_arg(args, 1, ctx)?);
        let before = haystack.find(&needle).map(|at| &haystack[..at]).unwrap_or_default();
        Ok(Value::String(before.to_string()))
    }

    fn fn_substring_after(&self, args: &[Expr], ctx: &Context) -> Result<Value, XPathError> {
        arity("substring-after", args, 2..=2)?;
        let (haystack, needle) = (self.string_arg(args, 0, ctx)?, self.string_arg(args, 1, ctx)?);
        let after = haystack
            .find(&needle)
            .map(|at| &haystack[at + needle.len()..])
            .unwrap_or_default();
        Ok(Value::String(after.to_string()))
    }

    /// Characters at positions `p` (1-based) with `round(start) <= p < round(start) + round(length)`.
    fn fn_substring(&self, args: &[Expr], ctx: &Context) -> Result<Value, XPathError> {
        arity("substring", args, 2..=3)?;
        let text = self.string_arg(args, 0, ctx)?;
        let start = xpath_round(self.number_arg(args, 1, ctx)?);
        let end = match args.get(2) {
            Some(_) => start + xpath_round(self.number_arg(args, 2, ctx)?),
            None => f64::INFINITY,
        };
        let result = text
            .chars()
            .enumerate()
            .filter(|&(index, _)| {
                let position = (index + 1) as f64;
                position >= start && position < end
            })
            .map(|(_, ch)| ch)
            .collect();
        Ok(Value::String(result))
    }

    fn fn_string_length(&self, args: &[Expr], ctx: &Context) -> Result<Value, XPathError> {
        arity("string-length", args, 0..=1)?;
        let text = self.string_arg_or_context(args, ctx)?;
        Ok(Value::Number(text.chars().count() as f64))
    }

    fn fn_normalize_space(&self, args: &[Expr], ctx: &Context) -> Result<Value, XPathError> {
        arity("normalize-space", args, 0..=1)?;
        let text = self.string_arg_or_context(args, ctx)?;
        let words: Vec<&str> = text.split(is_xml_whitespace).filter(|w| !w.is_empty()).collect();
        Ok(Value::String(words.join(" ")))
    }

    fn fn_translate(&self, args: &[Expr], ctx: &Context) -> Result<Value, XPathError> {
        arity("translate", args, 3..=3)?;
        let text = self.string_arg(args, 0, ctx)?;
        let from: Vec<char> = self.string_arg(args, 1, ctx)?.chars().collect();
        let to: Vec<char> = self.string_arg(args, 2, ctx)?.chars().collect();
        let result = text
            .chars()
            .filter_map(|ch| match from.iter().position(|&f| f == ch) {
                Some(index) => to.get(index).copied(),
                None => Some(ch),
            })
            .collect();
        Ok(Value::String(result))
    }

    fn fn_boolean(&self, args: &[Expr], ctx: &Context) -> Result<Value, XPathError> {
        arity("boolean", args, 1..=1)?;
        Ok(Value::Boolean(self.eval(&args[0], ctx)?.to_boolean()))
    }

    fn fn_not(&self, args: &[Expr], ctx: &Context) -> Result<Value, XPathError> {
        arity("not", args, 1..=1)?;
        Ok(Value::Boolean(!self.eval(&args[0], ctx)?.to_boolean()))
    }

    fn fn_true_value(&self, args: &[Expr], _ctx: &Context) -> Result<Value, XPathError> {
        arity("true", args, 0..=0)?;
        Ok(Value::Boolean(true))
    }

    fn fn_false_value(&self, args: &[Expr], _ctx: &Context) -> Result<Value, XPathError> {
        arity("false", args, 0..=0)?;
        Ok(Value::Boolean(false))
    }

    /// Whether the nearest `xml:lang` (or HTML `lang`) in scope is the given language or a sublanguage of it.
    fn fn_lang(&self, args: &[Expr], ctx: &Context) -> Result<Value, XPathError> {
        arity("lang", args, 1..=1)?;
        let wanted = self.string_arg(args, 0, ctx)?.to_ascii_lowercase();
        let declared = std::iter::once(ctx.node)
            .chain(self.doc.ancestors(ctx.node))
            .find_map(|node| {
                self.doc
                    .attribute(node, "xml:lang")
                    .or_else(|| self.doc.attribute(node, "lang"))
            });
        let matches = declared.is_some_and(|lang| {
            let lang = lang.to_ascii_lowercase();
            lang == wanted || lang.strip_prefix(&wanted).is_some_and(|rest| rest.starts_with('-'))
        });
        Ok(Value::Boolean(matches))
    }

    fn fn_number(&self, args: &[Expr], ctx: &Context) -> Result<Value, XPathError> {
        arity("number", args, 0..=1)?;
        let number = match args.first() {
            Some(_) => self.number_arg(args, 0, ctx)?,
            None => Value::NodeSet(vec![ctx.node]).to_number(self.doc),
        };
        Ok(Value::Number(number))
    }

    fn fn_sum(&self, args: &[Expr], ctx: &Context) -> Result<Value, XPathError> {
        arity("sum", args, 1..=1)?;
        let nodes = self.eval_node_set(&args[0], ctx, "the argument to sum()")?;
        let total = nodes
            .iter()
            .map(|&node| Value::NodeSet(vec![node]).to_number(self.doc))
            .sum();
        Ok(Value::Number(total))
    }

    fn fn_floor(&self, args: &[Expr], ctx: &Context) -> Result<Value, XPathError> {
        arity("floor", args, 1..=1)?;
        Ok(Value::Number(self.number_arg(args, 0, ctx)?.floor()))
    }

    fn fn_ceiling(&self, args: &[Expr], ctx: &Context) -> Result<Value, XPathError> {
        arity("ceiling", args, 1..=1)?;
        Ok(Value::Number(self.number_arg(args, 0, ctx)?.ceil()))
    }

    fn fn_round(&self, args: &[Expr], ctx: &Context) -> Result<Value, XPathError> {
        arity("round", args, 1..=1)?;
        Ok(Value::Number(xpath_round(self.number_arg(args, 0, ctx)?)))
    }
}

/// Rounds half toward positive infinity, keeping NaN and the infinities as they are.
fn xpath_round(n: f64) -> f64 {
    if n.is_nan() || n.is_infinite() {
        n
    } else {
        (n + 0.5).floor()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounding() {
        assert_eq!(xpath_round(2.5), 3.0);
        assert_eq!(xpath_round(-2.5), -2.0);
        assert_eq!(xpath_round(-0.4), 0.0);
        assert!(xpath_round(f64::NAN).is_nan());
        assert_eq!(xpath_round(f64::NEG_INFINITY), f64::NEG_INFINITY);
    }
}
