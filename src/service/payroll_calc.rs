use chrono::{Datelike, NaiveDate};
use rust_decimal::{Decimal, RoundingStrategy};

/// Inputs gathered for one employee and one pay month.
#[derive(Debug, Clone)]
pub struct PayInputs {
    pub basic_salary: Decimal,
    pub overtime_rate: Decimal,
    pub overtime_minutes: i64,
    pub unpaid_leave_days: i64,
    pub days_in_month: u32,
    pub advances: Decimal,
    pub deductions: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayFigures {
    pub overtime_pay: Decimal,
    pub unpaid_leave_deduction: Decimal,
    pub gross_pay: Decimal,
    pub net_pay: Decimal,
}

fn money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Net may be negative when advances exceed the month's earnings.
pub fn compute_pay(inputs: &PayInputs) -> PayFigures {
    let overtime_pay =
        money(inputs.overtime_rate * Decimal::from(inputs.overtime_minutes) / Decimal::from(60));

    let unpaid_leave_deduction = if inputs.days_in_month == 0 {
        Decimal::ZERO
    } else {
        money(
            inputs.basic_salary / Decimal::from(inputs.days_in_month)
                * Decimal::from(inputs.unpaid_leave_days),
        )
    };

    let gross_pay = inputs.basic_salary + overtime_pay;
    let net_pay = gross_pay - unpaid_leave_deduction - inputs.advances - inputs.deductions;

    PayFigures {
        overtime_pay,
        unpaid_leave_deduction,
        gross_pay,
        net_pay,
    }
}

/// Parses `YYYY-MM` into the first day of that month.
pub fn parse_month(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(&format!("{}-01", raw.trim()), "%Y-%m-%d").ok()
}

/// First and last day of the month containing `day`.
pub fn month_bounds(day: NaiveDate) -> (NaiveDate, NaiveDate) {
    let first = day.with_day(1).unwrap_or(day);
    let next_first = if first.month() == 12 {
        NaiveDate::from_ymd_opt(first.year() + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(first.year(), first.month() + 1, 1)
    };
    let last = next_first
        .and_then(|d| d.pred_opt())
        .unwrap_or(first);
    (first, last)
}

pub fn days_in_month(day: NaiveDate) -> u32 {
    let (first, last) = month_bounds(day);
    (last - first).num_days() as u32 + 1
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs() -> PayInputs {
        PayInputs {
            basic_salary: Decimal::from(30_000),
            overtime_rate: Decimal::from(120),
            overtime_minutes: 150,
            unpaid_leave_days: 2,
            days_in_month: 30,
            advances: Decimal::from(1_000),
            deductions: Decimal::from(500),
        }
    }

    #[test]
    fn computes_overtime_and_net() {
        let pay = compute_pay(&inputs());
        assert_eq!(pay.overtime_pay, Decimal::from(300));
        assert_eq!(pay.unpaid_leave_deduction, Decimal::from(2_000));
        assert_eq!(pay.gross_pay, Decimal::from(30_300));
        assert_eq!(pay.net_pay, Decimal::from(26_800));
    }

    #[test]
    fn rounds_to_cents() {
        let mut i = inputs();
        i.basic_salary = Decimal::from(10_000);
        i.days_in_month = 31;
        i.unpaid_leave_days = 1;
        let pay = compute_pay(&i);
        assert_eq!(pay.unpaid_leave_deduction, Decimal::new(32_258, 2));
    }

    #[test]
    fn net_can_go_negative() {
        let mut i = inputs();
        i.advances = Decimal::from(50_000);
        assert!(compute_pay(&i).net_pay.is_sign_negative());
    }

    #[test]
    fn month_helpers() {
        let feb = parse_month("2028-02").unwrap();
        assert_eq!(feb, NaiveDate::from_ymd_opt(2028, 2, 1).unwrap());
        assert_eq!(days_in_month(feb), 29);
        assert_eq!(
            month_bounds(NaiveDate::from_ymd_opt(2026, 12, 15).unwrap()).1,
            NaiveDate::from_ymd_opt(2026, 12, 31).unwrap()
        );
        assert!(parse_month("2026-13").is_none());
        assert!(parse_month("march").is_none());
    }
}
