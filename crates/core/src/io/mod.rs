pub mod notice;

pub use notice::{Notice, NoticeLevel, NoticeReceiver, NoticeSender, Operation, ReportSink};
