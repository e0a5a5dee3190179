mod leave;
mod timesheet;

pub use leave::{
    HALF_DAY, LeaveApplication, LeaveBalance, LeaveStatus, LeaveType, NewLeaveApplication,
    days_requested,
};
pub use timesheet::{EntryChanges, NewTimesheetEntry, TimesheetEntry, TimesheetStatus};
