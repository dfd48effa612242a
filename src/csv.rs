use serde::{Deserialize, Serialize};
use std::io;
use std::path::Path;
use thiserror::Error;

use crate::model::{Account, AccountId, AccountType, Command, UserId};
use crate::Amount;

/// Errors that can occur when parsing csv rows
#[derive(Debug, Error)]
pub enum CsvError {
    #[error("line {line}: failed to parse row: {source}")]
    Parse { line: usize, source: csv::Error },

    #[error("line {line}: unrecognized op '{op}'")]
    UnrecognizedOp { line: usize, op: String },

    #[error("line {line}: {op} missing {field}")]
    MissingField {
        line: usize,
        op: String,
        field: &'static str,
    },
}

#[derive(Debug, Deserialize)]
struct InputRow {
    op: String,
    owner: Option<UserId>,
    r#type: Option<AccountType>,
    sender: Option<AccountId>,
    receiver: Option<AccountId>,
    amount: Option<f64>,
}

impl InputRow {
    fn require<T>(value: Option<T>, line: usize, op: &str, field: &'static str) -> Result<T, CsvError> {
        value.ok_or_else(|| CsvError::MissingField {
            line,
            op: op.to_string(),
            field,
        })
    }
}

#[derive(Debug, Serialize)]
struct OutputRow {
    id: AccountId,
    owner: UserId,
    r#type: AccountType,
    balance: String,
}

/// Read commands from a csv file
pub fn read_commands(path: impl AsRef<Path>) -> impl Iterator<Item = Result<Command, CsvError>> {
    let reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .expect("failed to open csv file");

    reader
        .into_deserialize::<InputRow>()
        .enumerate()
        .map(|(idx, result)| {
            let line = idx + 2; // 1-indexed, skip header
            let row = result.map_err(|source| CsvError::Parse { line, source })?;
            match row.op.as_str() {
                "open" => {
                    let owner = InputRow::require(row.owner, line, "open", "owner")?;
                    let account_type = InputRow::require(row.r#type, line, "open", "type")?;
                    let balance = InputRow::require(row.amount, line, "open", "amount")?;
                    Ok(Command::Open {
                        owner,
                        account_type,
                        balance: Amount::from_float(balance),
                    })
                }
                "transfer" => {
                    let sender = InputRow::require(row.sender, line, "transfer", "sender")?;
                    let receiver = InputRow::require(row.receiver, line, "transfer", "receiver")?;
                    let amount = InputRow::require(row.amount, line, "transfer", "amount")?;
                    Ok(Command::Transfer {
                        sender,
                        receiver,
                        amount: Amount::from_float(amount),
                    })
                }
                other => Err(CsvError::UnrecognizedOp {
                    line,
                    op: other.to_string(),
                }),
            }
        })
}

/// write accounts to stdout in csv format
pub fn write_accounts(accounts: impl IntoIterator<Item = Account>) {
    let stdout = io::stdout();
    let mut writer = csv::Writer::from_writer(stdout.lock());

    for account in accounts {
        let row = OutputRow {
            id: account.id,
            owner: account.owner,
            r#type: account.account_type,
            balance: account.balance.to_string(),
        };
        writer.serialize(&row).expect("failed to write csv row");
    }

    writer.flush().expect("failed to flush csv writer");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const HEADER: &str = "op,owner,type,sender,receiver,amount\n";

    fn write_csv(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn read_open() {
        let file = write_csv(&format!("{HEADER}open,1,basicSavings,,,100.50\n"));
        let results: Vec<_> = read_commands(file.path()).collect();
        assert_eq!(results.len(), 1);

        let command = results.into_iter().next().unwrap().unwrap();
        match command {
            Command::Open {
                owner,
                account_type,
                balance,
            } => {
                assert_eq!(owner, 1);
                assert_eq!(account_type, AccountType::BasicSavings);
                assert_eq!(balance, Amount::from_float(100.50));
            }
            _ => panic!("expected open"),
        }
    }

    #[test]
    fn read_transfer() {
        let file = write_csv(&format!("{HEADER}transfer,,,1,2,25.00\n"));
        let results: Vec<_> = read_commands(file.path()).collect();
        assert_eq!(results.len(), 1);

        let command = results.into_iter().next().unwrap().unwrap();
        match command {
            Command::Transfer {
                sender,
                receiver,
                amount,
            } => {
                assert_eq!(sender, 1);
                assert_eq!(receiver, 2);
                assert_eq!(amount, Amount::from_float(25.0));
            }
            _ => panic!("expected transfer"),
        }
    }

    #[test]
    fn read_with_whitespace() {
        let file = write_csv("op, owner, type, sender, receiver, amount\nopen, 1, savings, , , 10.0\n");
        let results: Vec<_> = read_commands(file.path()).collect();
        assert_eq!(results.len(), 1);
        assert!(results[0].is_ok());
    }

    #[test]
    fn read_returns_error_for_unknown_op() {
        let file = write_csv(&format!("{HEADER}close,1,savings,,,10.0\n"));
        let results: Vec<_> = read_commands(file.path()).collect();
        assert_eq!(results.len(), 1);
        let err = results[0].as_ref().unwrap_err();
        assert!(matches!(err, CsvError::UnrecognizedOp { line: 2, .. }));
    }

    #[test]
    fn read_returns_error_for_missing_amount() {
        let file = write_csv(&format!("{HEADER}transfer,,,1,2,\n"));
        let results: Vec<_> = read_commands(file.path()).collect();
        assert_eq!(results.len(), 1);
        let err = results[0].as_ref().unwrap_err();
        assert!(matches!(
            err,
            CsvError::MissingField {
                line: 2,
                field: "amount",
                ..
            }
        ));
    }

    #[test]
    fn read_returns_error_for_missing_account_type() {
        let file = write_csv(&format!("{HEADER}open,1,,,,10.0\n"));
        let results: Vec<_> = read_commands(file.path()).collect();
        let err = results[0].as_ref().unwrap_err();
        assert!(matches!(
            err,
            CsvError::MissingField {
                line: 2,
                field: "type",
                ..
            }
        ));
    }

    #[test]
    fn read_returns_error_for_unknown_account_type() {
        let file = write_csv(&format!("{HEADER}open,1,premium,,,10.0\n"));
        let results: Vec<_> = read_commands(file.path()).collect();
        let err = results[0].as_ref().unwrap_err();
        assert!(matches!(err, CsvError::Parse { line: 2, .. }));
    }
}
