//! 批量解析器
//!
//! 为一组有序名称收集组件值：已解析的立即取用，构建中的登记等待，
//! 全部就绪后按请求顺序调用一次完成回调。完成回调从不在调用者的调用栈内执行。

use crate::build::{ComponentBuild, Waiter};
use crate::registry::{ComponentRegistryImpl, Slot};
use di_abstractions::{ComponentValue, DoneCallback, ProgressCallback};
use infrastructure_common::{DependencyError, DependencyResult};
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};
use uuid::Uuid;

enum Lookup {
    Ready(ComponentValue),
    Building(Arc<ComponentBuild>),
}

/// 单个请求位置的结果
#[derive(Clone)]
enum PendingValue {
    Pending,
    Resolved(ComponentValue),
}

impl PendingValue {
    fn value(&self) -> Option<ComponentValue> {
        match self {
            Self::Pending => None,
            Self::Resolved(value) => Some(value.clone()),
        }
    }
}

type Finished = (DoneCallback, Vec<ComponentValue>);

/// 一次批量解析调用的临时状态
struct ResolutionFrame {
    id: Uuid,
    names: Vec<String>,
    results: Vec<PendingValue>,
    /// 尚未就绪的位置数，外加初始扫描本身占用的一个计数
    outstanding: usize,
    on_done: Option<DoneCallback>,
    on_progress: Option<ProgressCallback>,
    watchdog: Option<JoinHandle<()>>,
    started_at: Instant,
}

impl ResolutionFrame {
    fn new(names: Vec<String>, on_done: DoneCallback, on_progress: Option<ProgressCallback>) -> Self {
        Self {
            id: Uuid::new_v4(),
            results: vec![PendingValue::Pending; names.len()],
            names,
            outstanding: 1,
            on_done: Some(on_done),
            on_progress,
            watchdog: None,
            started_at: Instant::now(),
        }
    }

    fn is_done(&self) -> bool {
        self.on_done.is_none()
    }

    fn unresolved_names(&self) -> Vec<&str> {
        self.names
            .iter()
            .zip(&self.results)
            .filter(|(_, result)| matches!(result, PendingValue::Pending))
            .map(|(name, _)| name.as_str())
            .collect()
    }

    /// 释放一个计数；计数归零时取出完成回调和按顺序排列的值
    fn release(&mut self) -> Option<Finished> {
        self.outstanding = self.outstanding.saturating_sub(1);
        if self.outstanding > 0 {
            return None;
        }

        let values = self
            .results
            .iter()
            .map(PendingValue::value)
            .collect::<Option<Vec<_>>>()?;
        let on_done = self.on_done.take()?;
        if let Some(watchdog) = self.watchdog.take() {
            watchdog.abort();
        }
        Some((on_done, values))
    }
}

impl ComponentRegistryImpl {
    /// 对一组名称执行批量解析，并在未立即完成时启动看门狗
    pub(crate) fn dispatch_watched(
        &self,
        names: Vec<String>,
        on_done: DoneCallback,
        on_progress: Option<ProgressCallback>,
    ) -> DependencyResult<()> {
        if let Some(frame) = self.dispatch_frame(names, on_done, on_progress)? {
            self.start_watchdog(&frame);
        }
        Ok(())
    }

    /// 对一组名称执行批量解析
    ///
    /// 任一名称未注册时立即返回错误，且不会触发任何构建。
    /// 用于组件构建时解析其依赖，不启动看门狗。
    pub(crate) fn dispatch(
        &self,
        names: Vec<String>,
        on_done: DoneCallback,
        on_progress: Option<ProgressCallback>,
    ) -> DependencyResult<()> {
        self.dispatch_frame(names, on_done, on_progress).map(|_| ())
    }

    /// 返回尚未完成的解析帧
    fn dispatch_frame(
        &self,
        names: Vec<String>,
        on_done: DoneCallback,
        on_progress: Option<ProgressCallback>,
    ) -> DependencyResult<Option<Arc<Mutex<ResolutionFrame>>>> {
        let lookups = {
            let slots = self.slots().read();
            names
                .iter()
                .map(|name| match slots.get(name) {
                    Some(Slot::Resolved(value)) => Ok(Lookup::Ready(value.clone())),
                    Some(Slot::Pending(build)) => Ok(Lookup::Building(Arc::clone(build))),
                    None => Err(DependencyError::not_registered(name)),
                })
                .collect::<DependencyResult<Vec<_>>>()?
        };

        let frame = Arc::new(Mutex::new(ResolutionFrame::new(names, on_done, on_progress)));
        for (index, lookup) in lookups.into_iter().enumerate() {
            match lookup {
                Lookup::Ready(value) => {
                    frame.lock().results[index] = PendingValue::Resolved(value);
                }
                Lookup::Building(build) => {
                    frame.lock().outstanding += 1;
                    build.build(self, waiter(Arc::clone(&frame), index));
                }
            }
        }

        let finished = frame.lock().release();
        match finished {
            Some((on_done, values)) => {
                tokio::spawn(async move { on_done(values) });
                Ok(None)
            }
            None => Ok(Some(frame)),
        }
    }

    fn start_watchdog(&self, frame: &Arc<Mutex<ResolutionFrame>>) {
        let Some(timeout) = self.config().watchdog_timeout() else {
            return;
        };

        let watched = Arc::downgrade(frame);
        let handle = tokio::spawn(watch(watched, timeout));

        let mut guard = frame.lock();
        if guard.is_done() {
            handle.abort();
        } else {
            debug!(resolution = %guard.id, timeout_ms = timeout.as_millis() as u64, "启动解析看门狗");
            guard.watchdog = Some(handle);
        }
    }
}

fn waiter(frame: Arc<Mutex<ResolutionFrame>>, index: usize) -> Waiter {
    Box::new(move |value: ComponentValue| {
        let (progress, finished) = {
            let mut frame = frame.lock();
            frame.results[index] = PendingValue::Resolved(value);
            let finished = frame.release();
            let progress = if finished.is_none() && !frame.is_done() {
                frame
                    .on_progress
                    .clone()
                    .map(|on_progress| (on_progress, frame.names[index].clone()))
            } else {
                None
            };
            (progress, finished)
        };

        if let Some((on_progress, name)) = progress {
            on_progress(&name);
        }
        if let Some((on_done, values)) = finished {
            on_done(values);
        }
    })
}

async fn watch(frame: Weak<Mutex<ResolutionFrame>>, timeout: Duration) {
    tokio::time::sleep(timeout).await;

    let Some(frame) = frame.upgrade() else {
        return;
    };
    let frame = frame.lock();
    if frame.is_done() {
        return;
    }

    warn!(
        resolution = %frame.id,
        elapsed_ms = frame.started_at.elapsed().as_millis() as u64,
        pending = ?frame.unresolved_names(),
        "组件解析超过看门狗等待时间，仍在等待以下组件"
    );
}
