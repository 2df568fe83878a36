use tabula_table::{ColumnSummary, SchemaPreview};

/// Instruction block sent for every question. `{preview}` and `{question}`
/// are the only substitution points.
pub const PROMPT_TEMPLATE: &str = "\
You are working with a pandas dataframe in Python.
The name of the dataframe is `df`.
This is the result of `print(df.head())`:
{preview}

Follow these instructions:
1. Convert the query to a single pandas expression over `df`.
2. The expression must be evaluable on its own: no assignments, imports or statements.
3. The expression should represent a solution to the query.
4. PRINT ONLY THE EXPRESSION, without prose or explanation.
5. Do not quote the expression or wrap it in code fences.
Query: {question}

Expression:";

/// A rendered prompt together with the inputs it was rendered from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    text: String,
    question: String,
    columns: Vec<ColumnSummary>,
}

impl Prompt {
    pub fn new(question: &str, preview: &SchemaPreview) -> Self {
        let substitutions = [
            ("{preview}", preview.text().trim_end()),
            ("{question}", question.trim()),
        ];
        let mut text = String::with_capacity(PROMPT_TEMPLATE.len() + preview.text().len());
        let mut rest = PROMPT_TEMPLATE;
        for (marker, value) in substitutions {
            if let Some((head, tail)) = rest.split_once(marker) {
                text.push_str(head);
                text.push_str(value);
                rest = tail;
            }
        }
        text.push_str(rest);
        Self {
            text,
            question: question.trim().to_string(),
            columns: preview.columns().to_vec(),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn question(&self) -> &str {
        &self.question
    }

    pub fn columns(&self) -> &[ColumnSummary] {
        &self.columns
    }
}
