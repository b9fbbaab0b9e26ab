//! Query translation from docstore predicates to MongoDB query syntax.

use bson::{Bson, Document, doc};

use docstore_core::{
    error::DocumentStoreError,
    query::{Expr, FieldOp, QueryVisitor},
};

/// Translates backend predicates into MongoDB filter documents.
pub(crate) struct MongoQueryTranslator;

impl QueryVisitor for MongoQueryTranslator {
    type Output = Document;
    type Error = DocumentStoreError;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        // MongoDB rejects an empty $and
        if exprs.is_empty() {
            return Ok(doc! {});
        }

        Ok(doc! {
            "$and": exprs
                .iter()
                .map(|expr| self.visit_expr(expr))
                .collect::<Result<Vec<_>, _>>()?,
        })
    }

    fn visit_field(
        &mut self,
        field: &str,
        op: FieldOp,
        value: &Bson,
    ) -> Result<Self::Output, Self::Error> {
        Ok(doc! {
            field: match op {
                FieldOp::Eq => doc! { "$eq": value },
                FieldOp::Lt => doc! { "$lt": value },
                FieldOp::Contains => match value {
                    Bson::String(s) => doc! { "$regex": regex::escape(s) },
                    Bson::Int32(_) | Bson::Int64(_) => {
                        doc! { "$regex": regex::escape(&value.to_string()) }
                    }
                    _ => {
                        return Err(DocumentStoreError::Backend(format!(
                            "Contains operator requires a string or integer value, got {value}"
                        )));
                    }
                },
            }
        })
    }
}
